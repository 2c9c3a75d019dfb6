pub mod core {
    pub mod data_type;
    pub mod identifiers;
    pub mod value;
}

pub mod pagination {
    pub mod position;
}

pub mod records {
    pub mod batch;
    pub mod error_record;
    pub mod record;
    pub mod row;
}
