//! Built-in platform source compiled when a compiler is constructed.

/// Source id of the bootstrap model. Its first segment places it in the
/// platform repository, which every repository can see.
pub const PLATFORM_SOURCE_ID: &str = "/platform/m3.pure";

pub const PLATFORM_SOURCE: &str = r#"
Class meta::pure::metamodel::type::Any
{
}

Class meta::pure::metamodel::type::Nil
{
}

Primitive meta::pure::metamodel::type::String;
Primitive meta::pure::metamodel::type::Boolean;
Primitive meta::pure::metamodel::type::Number;
Primitive meta::pure::metamodel::type::Integer extends Number;
Primitive meta::pure::metamodel::type::Float extends Number;
Primitive meta::pure::metamodel::type::Decimal extends Number;
Primitive meta::pure::metamodel::type::Date;
Primitive meta::pure::metamodel::type::StrictDate extends Date;
Primitive meta::pure::metamodel::type::DateTime extends Date;

Profile meta::pure::profiles::access
{
    stereotypes: [private, protected, public, externalizable];
}

Profile meta::pure::profiles::doc
{
    tags: [doc];
}

Class meta::pure::functions::collection::Map<K, V>
{
}

Class meta::pure::router::Result
{
}

native function meta::pure::functions::collection::size<T>(collection: T[*]): Integer[1];
native function meta::pure::functions::collection::isEmpty<T>(collection: T[*]): Boolean[1];
native function meta::pure::functions::string::toString(value: Any[1]): String[1];
native function meta::pure::functions::string::joinStrings(values: String[*], separator: String[1]): String[1];
"#;
