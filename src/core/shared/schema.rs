diesel::table! {
    departments (id) {
        id -> Int4,
        name -> Varchar,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    designations (id) {
        id -> Int4,
        name -> Varchar,
        description -> Nullable<Text>,
        department_id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    roles (id) {
        id -> Int4,
        title -> Varchar,
        description -> Nullable<Text>,
        department_id -> Nullable<Int4>,
        is_management -> Bool,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    employees (id) {
        id -> Int4,
        username -> Varchar,
        password_hash -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        first_name -> Varchar,
        last_name -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        department_id -> Nullable<Int4>,
        designation_id -> Nullable<Int4>,
        role_id -> Nullable<Int4>,
        is_active -> Bool,
        last_login -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    leads (id) {
        id -> Int4,
        client_name -> Varchar,
        bride_name -> Nullable<Varchar>,
        groom_name -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        wedding_date -> Nullable<Date>,
        lead_source -> Nullable<Varchar>,
        status -> Varchar,
        priority -> Varchar,
        estimated_value -> Nullable<Numeric>,
        assigned_to -> Nullable<Int4>,
        notes -> Nullable<Text>,
        follow_up_date -> Nullable<Timestamptz>,
        created_by -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    quotations (id) {
        id -> Int4,
        lead_id -> Nullable<Int4>,
        quotation_number -> Varchar,
        slug -> Varchar,
        client_name -> Varchar,
        bride_name -> Nullable<Varchar>,
        groom_name -> Nullable<Varchar>,
        mobile -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        default_package -> Varchar,
        total_amount -> Numeric,
        status -> Varchar,
        quotation_data -> Jsonb,
        events_count -> Int4,
        created_by -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        reviewed_by -> Nullable<Int4>,
        reviewed_at -> Nullable<Timestamptz>,
        review_comments -> Nullable<Text>,
    }
}

diesel::table! {
    quotation_approvals (id) {
        id -> Int4,
        quotation_id -> Int4,
        approval_status -> Varchar,
        comments -> Nullable<Text>,
        approver_id -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    menu_items (id) {
        id -> Int4,
        parent_id -> Nullable<Int4>,
        name -> Varchar,
        description -> Nullable<Text>,
        icon -> Nullable<Varchar>,
        path -> Nullable<Varchar>,
        sort_order -> Int4,
        is_visible -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    role_menu_permissions (id) {
        id -> Int4,
        role_id -> Int4,
        menu_item_id -> Int4,
        can_view -> Bool,
        can_add -> Bool,
        can_edit -> Bool,
        can_delete -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int4,
        employee_id -> Int4,
        title -> Varchar,
        message -> Text,
        notification_type -> Varchar,
        is_read -> Bool,
        data -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    call_transcriptions (id) {
        id -> Int4,
        call_id -> Varchar,
        lead_id -> Nullable<Int4>,
        employee_id -> Nullable<Int4>,
        client_name -> Nullable<Varchar>,
        client_phone -> Nullable<Varchar>,
        duration_seconds -> Int4,
        recording_url -> Nullable<Text>,
        transcript -> Nullable<Text>,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (id) {
        id -> Int4,
        title -> Varchar,
        description -> Nullable<Text>,
        task_type -> Varchar,
        priority -> Varchar,
        status -> Varchar,
        assigned_to -> Nullable<Int4>,
        lead_id -> Nullable<Int4>,
        quotation_id -> Nullable<Int4>,
        due_date -> Nullable<Timestamptz>,
        metadata -> Jsonb,
        completed_at -> Nullable<Timestamptz>,
        created_by -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    whatsapp_messages (id) {
        id -> Int4,
        message_id -> Varchar,
        lead_id -> Nullable<Int4>,
        quotation_id -> Nullable<Int4>,
        client_phone -> Varchar,
        client_name -> Nullable<Varchar>,
        direction -> Varchar,
        message_type -> Varchar,
        body -> Text,
        sent_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(designations -> departments (department_id));
diesel::joinable!(employees -> roles (role_id));
diesel::joinable!(role_menu_permissions -> roles (role_id));
diesel::joinable!(role_menu_permissions -> menu_items (menu_item_id));
diesel::joinable!(notifications -> employees (employee_id));
diesel::joinable!(quotation_approvals -> quotations (quotation_id));
diesel::joinable!(whatsapp_messages -> leads (lead_id));

diesel::allow_tables_to_appear_in_same_query!(
    departments,
    designations,
    roles,
    employees,
    leads,
    quotations,
    menu_items,
    role_menu_permissions,
    notifications,
    call_transcriptions,
    quotation_approvals,
    tasks,
    whatsapp_messages,
);
