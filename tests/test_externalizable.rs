use pure_core::{AccessLevel, CompilerConfig, IncrementalCompiler, PureError};

fn compiler() -> IncrementalCompiler {
    IncrementalCompiler::new(CompilerConfig::default()).unwrap()
}

fn compile(sources: &[(&str, &str)]) -> Result<IncrementalCompiler, PureError> {
    let mut compiler = compiler();
    compiler.create_in_memory_and_compile(sources)?;
    Ok(compiler)
}

const FIND_A: &str = "function <<access.externalizable>> a::find(name: String[1]): String[1] { $name }\n";
const FIND_B: &str = "\nfunction <<access.externalizable>> b::find(id: Integer[1]): String[1] { 'b' }\n";

#[test]
fn test_externalizable_access_level_is_cached() {
    let compiler = compile(&[("/a.pure", FIND_A)]).unwrap();
    let find = compiler.get_function("a::find(String[1]):String[1]").unwrap();
    assert_eq!(find.access, Some(AccessLevel::Externalizable));
}

#[test]
fn test_name_collision_lists_both_functions() {
    let mut compiler = compile(&[("/a.pure", FIND_A)]).unwrap();
    let a_span = compiler.get_function("a::find(String[1]):String[1]").unwrap().name_span;

    compiler.create_source("/b.pure", FIND_B).unwrap();
    let error = compiler.compile().unwrap_err();
    let error = error.as_compilation().unwrap();
    assert_eq!(error.kind.category(), "NameConflictError");

    let expected_a = format!(
        "a::find(String[1]):String[1] at /a.pure:{}:{}-{}:{}",
        a_span.start_line, a_span.start_col, a_span.end_line, a_span.end_col
    );
    let message = error.message();
    assert!(message.starts_with("Externalizable function name 'find' is not unique: "));
    assert!(message.contains(&expected_a), "{}", message);
    assert!(message.contains("b::find(Integer[1]):String[1] at /b.pure:2:"), "{}", message);

    // Reported at the later function in path order.
    assert_eq!(error.location.source, "/b.pure");
    assert_eq!(error.location.line, 2);
    assert!(compiler.get_function("b::find(Integer[1]):String[1]").is_none());
}

#[test]
fn test_same_name_is_fine_when_only_one_is_externalizable() {
    compile(&[
        ("/a.pure", FIND_A),
        ("/b.pure", "function b::find(id: Integer[1]): String[1] { 'b' }\n"),
    ])
    .unwrap();
}

#[test]
fn test_renaming_resolves_collision() {
    let mut compiler = compile(&[("/a.pure", FIND_A)]).unwrap();
    compiler.create_source("/b.pure", FIND_B).unwrap();
    assert!(compiler.compile().is_err());

    compiler
        .modify("/b.pure", "function <<access.externalizable>> b::lookup(id: Integer[1]): String[1] { 'b' }\n")
        .unwrap();
    compiler.compile().unwrap();
    assert!(compiler.get_element("b::lookup_Integer_1__String_1_").is_some());
}

#[test]
fn test_externalizable_on_class_is_rejected() {
    let error = compile(&[("/c.pure", "Class <<access.externalizable>> c::C {}\n")]).unwrap_err();
    let error = error.as_compilation().unwrap();
    assert_eq!(error.kind.category(), "AccessLevelError");
    assert_eq!(error.message(), "Only functions may have an access level of externalizable");
}

#[test]
fn test_access_stereotype_on_enumeration_is_rejected() {
    let error = compile(&[("/e.pure", "Enum <<access.private>> e::E { A }\n")]).unwrap_err();
    assert_eq!(
        error.as_compilation().unwrap().message(),
        "Access level stereotypes are only allowed on classes and functions, found one on Enumeration e::E"
    );
}

#[test]
fn test_route_binds_externalizable_function() {
    let text = "function <<access.externalizable>> r::person(id: Integer[1], verbose: Boolean[0..1]): String[1] { 'p' }\n\
                ###Route\n\
                Route r::people { function: r::person; path: '/people/{id}'; }\n";
    let compiler = compile(&[("/r.pure", text)]).unwrap();
    assert!(compiler.get_element("r::people").is_some());
}

#[test]
fn test_route_parameter_type_restriction() {
    let text = "function <<access.externalizable>> r::tagged(tags: String[*]): String[1] { 'p' }\n\
                ###Route\n\
                Route r::byTag { function: r::tagged; path: '/tags/{tags}'; }\n";
    let error = compile(&[("/r.pure", text)]).unwrap_err();
    let error = error.as_compilation().unwrap();
    assert_eq!(error.kind.category(), "ParameterTypeError");
    assert!(error.message().starts_with("Parameter 'tags' of r::tagged(String[*]):String[1] is bound to a route path segment"));
}
