pub mod adapter;
pub mod error;

pub mod memory {
    pub mod adapter;
    pub mod cursor;
}

pub mod sql {
    pub mod base {
        pub mod adapter;
        pub mod error;
        pub mod pattern;
        pub mod requests;

        pub mod metadata {
            pub mod column;
            pub mod table;
        }

        pub mod query {
            pub mod dialect;
            pub mod generator;
        }
    }

    pub mod postgres {
        pub mod adapter;
        pub mod cursor;
        pub mod params;
        pub mod row;
        pub mod utils;
    }
}
