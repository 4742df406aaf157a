// Diesel table definitions. Keep in sync with `DbContext::init_schema`.

diesel::table! {
    documents (id) {
        id -> Integer,
        document -> Text,
        content_hash -> Text,
        ocr_text -> Text,
        layout_json -> Text,
        ocr_confidence -> Nullable<Float>,
        agent_reasoning -> Nullable<Text>,
        confidence_score -> Nullable<Float>,
        flag -> Nullable<Text>,
        intelligence -> Nullable<Text>,
        embedding -> Nullable<Text>,
        status -> Text,
        error -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}
