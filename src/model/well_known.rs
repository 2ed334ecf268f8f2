//! Paths of platform elements the compiler refers to directly.

pub const ANY: &str = "meta::pure::metamodel::type::Any";
pub const NIL: &str = "meta::pure::metamodel::type::Nil";
pub const STRING: &str = "meta::pure::metamodel::type::String";
pub const BOOLEAN: &str = "meta::pure::metamodel::type::Boolean";
pub const INTEGER: &str = "meta::pure::metamodel::type::Integer";
pub const FLOAT: &str = "meta::pure::metamodel::type::Float";
pub const MAP: &str = "meta::pure::functions::collection::Map";
pub const ROUTE_RESULT: &str = "meta::pure::router::Result";
pub const ACCESS_PROFILE: &str = "meta::pure::profiles::access";

/// Packages every source imports implicitly.
pub const AUTO_IMPORTS: &[&str] = &[
    "meta::pure::metamodel::type",
    "meta::pure::profiles",
    "meta::pure::functions::collection",
    "meta::pure::functions::string",
];
