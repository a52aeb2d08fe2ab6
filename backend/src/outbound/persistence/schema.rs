//! Diesel table definitions mirroring `migrations/`.
//!
//! Keep in sync with the SQL; `diesel print-schema` against a migrated
//! database regenerates this file.

diesel::table! {
    /// Single-currency accounts with their settled balance and holds.
    accounts (id) {
        id -> Uuid,
        #[max_length = 255]
        owner_subject -> Varchar,
        #[max_length = 3]
        currency -> Varchar,
        balance -> Int8,
        reserved -> Int8,
        version -> Int8,
        #[max_length = 16]
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Transfer records keyed by initiator and idempotency key.
    transactions (id) {
        id -> Uuid,
        #[max_length = 255]
        initiator_subject -> Varchar,
        #[max_length = 255]
        idempotency_key -> Varchar,
        payload_hash -> Bytea,
        from_account_id -> Uuid,
        to_account_id -> Uuid,
        amount -> Int8,
        #[max_length = 3]
        currency -> Varchar,
        #[max_length = 16]
        status -> Varchar,
        reserved -> Bool,
        #[max_length = 32]
        failure_reason -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only balance movements.
    ledger_entries (id) {
        id -> Uuid,
        seq -> Int8,
        account_id -> Uuid,
        transaction_id -> Nullable<Uuid>,
        #[max_length = 16]
        kind -> Varchar,
        delta -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(ledger_entries -> accounts (account_id));
diesel::joinable!(ledger_entries -> transactions (transaction_id));

diesel::allow_tables_to_appear_in_same_query!(accounts, transactions, ledger_entries);
