use pure_core::{CompilerConfig, IncrementalCompiler, PureError};

const DESCRIBE: &str = "function f::describe(s: String[1]): String[1] { $s }\n\
                        function f::describe(i: Integer[1]): String[1] { toString($i) }\n";

fn compile(sources: &[(&str, &str)]) -> Result<IncrementalCompiler, PureError> {
    let mut compiler = IncrementalCompiler::new(CompilerConfig::default())?;
    compiler.create_in_memory_and_compile(sources)?;
    Ok(compiler)
}

fn message(text: &str) -> String {
    compile(&[("/f.pure", text)])
        .err()
        .and_then(|e| e.as_compilation().map(|c| c.message()))
        .unwrap_or_default()
}

/// Paths of the functions `owner` has a resolved reference to.
fn callees(compiler: &IncrementalCompiler, owner: &str) -> Vec<String> {
    let graph = compiler.graph();
    let mut targets: Vec<String> = graph
        .lookup_element(owner)
        .unwrap()
        .resolved_targets()
        .map(|(_, target)| graph.path_of(target).to_string())
        .filter(|path| path.starts_with("f::"))
        .collect();
    targets.sort();
    targets
}

#[test]
fn test_overloads_get_distinct_signature_ids() {
    let compiler = compile(&[("/d.pure", DESCRIBE)]).unwrap();
    assert!(compiler.get_element("f::describe_String_1__String_1_").is_some());
    assert!(compiler.get_element("f::describe_Integer_1__String_1_").is_some());
}

#[test]
fn test_overload_resolution_by_argument_type() {
    let compiler = compile(&[
        ("/d.pure", DESCRIBE),
        ("/u.pure", "function f::useInt(): String[1] { describe(1) }\nfunction f::useStr(): String[1] { describe('x') }\n"),
    ])
    .unwrap();
    assert_eq!(callees(&compiler, "f::useInt__String_1_"), vec!["f::describe_Integer_1__String_1_"]);
    assert_eq!(callees(&compiler, "f::useStr__String_1_"), vec!["f::describe_String_1__String_1_"]);
}

#[test]
fn test_no_matching_overload() {
    let error = compile(&[("/d.pure", DESCRIBE), ("/u.pure", "function f::use(): String[1]\n{\n  describe(true)\n}\n")])
        .unwrap_err();
    let error = error.as_compilation().unwrap();
    assert_eq!(error.kind.category(), "ReferenceNotFoundError");
    assert_eq!(error.message(), "The system can't find a match for the function: describe(Boolean[1])");
    assert_eq!((error.location.line, error.location.col), (3, 3));
}

#[test]
fn test_removing_an_overload_revalidates_callers() {
    let mut compiler = compile(&[
        ("/d.pure", DESCRIBE),
        ("/u.pure", "function f::use(): String[1] { describe(1) }\n"),
    ])
    .unwrap();

    compiler.modify("/d.pure", "function f::describe(s: String[1]): String[1] { $s }\n").unwrap();
    let error = compiler.compile().unwrap_err();
    let error = error.as_compilation().unwrap();
    assert_eq!(error.message(), "The system can't find a match for the function: describe(Integer[1])");
    assert_eq!(error.location.source, "/u.pure");
}

#[test]
fn test_adding_an_overload_is_picked_up() {
    let mut compiler = compile(&[
        ("/d.pure", "function f::describe(s: String[1]): String[1] { $s }\n"),
        ("/u.pure", "function f::use(): String[1] { describe('x') }\n"),
    ])
    .unwrap();

    compiler
        .create_source("/more.pure", "function f::describe(b: Boolean[1]): String[1] { 'flag' }\n")
        .unwrap();
    compiler.modify("/u.pure", "function f::use(): String[1] { describe(true) }\n").unwrap();
    compiler.compile().unwrap();
    assert_eq!(callees(&compiler, "f::use__String_1_"), vec!["f::describe_Boolean_1__String_1_"]);
}

#[test]
fn test_arrow_call_passes_receiver_first() {
    compile(&[(
        "/f.pure",
        "function f::count(names: String[*]): Integer[1] { $names->size() }\n\
         function f::joined(names: String[*]): String[1] { $names->joinStrings(', ') }\n",
    )])
    .unwrap();
}

#[test]
fn test_generic_function_return_is_instantiated() {
    let text = "native function f::first<T>(values: T[*]): T[0..1];\n\
                function f::head(): String[0..1] { first(['a', 'b']) }\n\
                function f::wrong(): Integer[0..1] { first(['a', 'b']) }\n";
    assert_eq!(message(text), "Return type error in function 'wrong'; found: String; expected: Integer");
}

#[test]
fn test_collection_widens_to_common_supertype() {
    let classes = "Class f::Animal {}\nClass f::Cat extends f::Animal {}\nClass f::Dog extends f::Animal {}\n";
    let pets = "function f::pets(c: f::Cat[1], d: f::Dog[1]): f::Animal[*] { [$c, $d] }\n";
    compile(&[("/f.pure", classes), ("/p.pure", pets)]).unwrap();

    let text = format!("{}function f::wrong(c: f::Cat[1], d: f::Dog[1]): f::Cat[*] {{ [$c, $d] }}\n", classes);
    assert_eq!(message(&text), "Return type error in function 'wrong'; found: Animal; expected: Cat");
}

#[test]
fn test_return_multiplicity() {
    assert_eq!(
        message("function f::many(): String[1] { ['a', 'b'] }\n"),
        "Return multiplicity error in function 'many'; found: [2]; expected: [1]"
    );
    assert_eq!(
        message("function f::none(): String[1] { [] }\n"),
        "Return multiplicity error in function 'none'; found: [0]; expected: [1]"
    );
}

#[test]
fn test_let_bindings_and_unknown_variables() {
    compile(&[("/f.pure", "function f::greet(): String[1] { let n = 'hi'; $n }\n")]).unwrap();
    assert_eq!(message("function f::greet(): String[1] { $missing }\n"), "$missing has not been defined!");
}

#[test]
fn test_enum_values() {
    let colours = "Enum f::Colour { Red, Green }\n";
    compile(&[("/f.pure", &format!("{}function f::c(): f::Colour[1] {{ f::Colour.Red }}\n", colours))]).unwrap();
    assert_eq!(
        message(&format!("{}function f::c(): f::Colour[1] {{ f::Colour.Blue }}\n", colours)),
        "The enum value 'Blue' can't be found in the enumeration f::Colour"
    );
}

#[test]
fn test_function_types_in_signatures() {
    let text = "native function f::apply(fn: {String[1]->Integer[1]}[1], s: String[1]): Integer[1];\n";
    let compiler = compile(&[("/f.pure", text)]).unwrap();
    assert!(compiler.get_function("f::apply({String[1]->Integer[1]}[1], String[1]):Integer[1]").is_some());
}

#[test]
fn test_qualified_call_skips_imports() {
    let text = "function g::describe(s: String[1]): String[1] { $s }\n\
                function f::use(): String[1] { g::describe('x') }\n";
    let compiler = compile(&[("/f.pure", text)]).unwrap();
    let graph = compiler.graph();
    let targets: Vec<_> = graph
        .lookup_element("f::use__String_1_")
        .unwrap()
        .resolved_targets()
        .map(|(_, t)| graph.path_of(t).to_string())
        .collect();
    assert!(targets.contains(&"g::describe_String_1__String_1_".to_string()));
}
