//! Diesel table definitions. Timestamps are RFC 3339 TEXT, money amounts
//! are TEXT decimals, dates are ISO `YYYY-MM-DD` TEXT.

diesel::table! {
    reports (local_id) {
        local_id -> Text,
        remote_id -> Nullable<Text>,
        title -> Text,
        category -> Nullable<Text>,
        currency -> Text,
        notes -> Nullable<Text>,
        report_date -> Nullable<Text>,
        is_archived -> Bool,
        sync_status -> Text,
        created_at -> Text,
        updated_at -> Text,
        last_synced_at -> Nullable<Text>,
    }
}

diesel::table! {
    items (local_id) {
        local_id -> Text,
        remote_id -> Nullable<Text>,
        parent_local_id -> Text,
        title -> Text,
        amount -> Text,
        currency -> Text,
        category -> Nullable<Text>,
        extracted_data -> Nullable<Text>,
        item_date -> Nullable<Text>,
        is_archived -> Bool,
        sync_status -> Text,
        created_at -> Text,
        updated_at -> Text,
        last_synced_at -> Nullable<Text>,
    }
}

diesel::table! {
    sync_queue (queue_id) {
        queue_id -> BigInt,
        table_name -> Text,
        record_id -> Text,
        action -> Text,
        payload -> Text,
        attempts -> Integer,
        last_error -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    schema_version (id) {
        id -> Integer,
        version -> Integer,
        applied_at -> Text,
    }
}

diesel::joinable!(items -> reports (parent_local_id));

diesel::allow_tables_to_appear_in_same_query!(reports, items, sync_queue);
