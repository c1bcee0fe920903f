diesel::table! {
    employees (id) {
        id -> Uuid,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        password_hash -> Text,
        role -> SmallInt,
        status -> SmallInt,
        location -> Nullable<Varchar>,
        preferred_language -> Varchar,
        phone -> Nullable<Varchar>,
        department -> Varchar,
        hire_date -> Timestamptz,
        last_login -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    leads (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        company -> Nullable<Varchar>,
        source -> SmallInt,
        status -> SmallInt,
        lead_type -> SmallInt,
        assigned_to -> Nullable<Uuid>,
        location -> Nullable<Varchar>,
        preferred_language -> Varchar,
        notes -> Nullable<Text>,
        value -> Double,
        currency -> SmallInt,
        tags -> Array<Text>,
        scheduled_call_date -> Nullable<Timestamptz>,
        scheduled_call_type -> Nullable<SmallInt>,
        scheduled_call_notes -> Nullable<Text>,
        assigned_date -> Nullable<Timestamptz>,
        closed_date -> Nullable<Timestamptz>,
        last_contact -> Nullable<Timestamptz>,
        next_follow_up -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    activities (id) {
        id -> Uuid,
        actor -> Uuid,
        action -> SmallInt,
        entity_type -> SmallInt,
        entity_id -> Nullable<Uuid>,
        description -> Varchar,
        details -> Jsonb,
        severity -> SmallInt,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(leads -> employees (assigned_to));
diesel::joinable!(activities -> employees (actor));

diesel::allow_tables_to_appear_in_same_query!(employees, leads, activities);
