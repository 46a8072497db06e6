//! End-to-end properties of the converter, checked through the public API.

use caseconf_core::pass5_refs::resolve_references;
use caseconf_core::{
    apply_assignments, convert_str, emit, serialize, Assignment, DiagnosticKind, ErrorKind,
    GraphVisitor, ObjectGraph, ObjectId, ObjectRecord, ParseOptions, Value,
};

fn conv(src: &str) -> ObjectGraph {
    convert_str(src, "props.conf", &ParseOptions::default())
        .unwrap_or_else(|e| panic!("conversion failed: {}", e))
}

const INVESTIGATION: &str = "\
# an investigation and the tool that ran in it
[{OBJ-TAG}]tool
core_Tool.name[==][{str}] bulk_extractor
core_Tool.version[==][{str}] \"1.6\"

[{OBJ-TAG}investigation
core_Investigation.name[==][{str}] case-42
core_Investigation.start[==][{datetime}] 2019-07-04T10:30:00.500Z

core_Action.performer[==][{OBJ-REF}] tool
core_Action.investigations[==][{list:OBJ-REF}] investigation
core_Action.exit_codes[==][{list:int}] 0[ | ]2
core_Action.ok[==][{bool}] true
";

#[test]
fn conversion_is_deterministic() {
    let first = conv(INVESTIGATION);
    let second = conv(INVESTIGATION);
    assert!(first.structurally_eq(&second));
    assert_eq!(serialize(&first), serialize(&second));
}

#[test]
fn emitted_document_parses_back_to_the_same_graph() {
    let graph = conv(INVESTIGATION);
    let text = emit(&graph).unwrap();
    let again = convert_str(&text, "emitted", &ParseOptions::default()).unwrap();
    assert!(graph.structurally_eq(&again), "emitted:\n{}", text);
}

#[test]
fn emitted_document_is_a_fixed_point() {
    let graph = conv(INVESTIGATION);
    let text = emit(&graph).unwrap();
    let again = convert_str(&text, "emitted", &ParseOptions::default()).unwrap();
    assert_eq!(emit(&again).unwrap(), text);
}

#[test]
fn embedded_documents_round_trip_too() {
    let src = "\
|~~|
propbundle_Hash.hash_method[==][{str}] MD5
|~~|
|~~|
propbundle_File.filename[==][{str}] \"  padded  \"
propbundle_File.hash[==][{|^^|}]
|~~|
core_Trace.[==][{}]
||||
propbundle_ContentData.file[==][{list:|^^|}]
";
    let graph = conv(src);
    let text = emit(&graph).unwrap();
    let again = convert_str(&text, "emitted", &ParseOptions::default()).unwrap();
    assert!(graph.structurally_eq(&again), "emitted:\n{}", text);
}

#[test]
fn reference_resolution_is_idempotent() {
    let graph = conv(INVESTIGATION);
    let mut records = graph.records().to_vec();
    resolve_references(&mut records, graph.tags(), "props.conf").unwrap();
    assert_eq!(records, graph.records());
    resolve_references(&mut records, graph.tags(), "props.conf").unwrap();
    assert_eq!(records, graph.records());
}

#[test]
fn inheritance_merges_class_groups() {
    let graph = conv(
        "\
core_Trace.has_changed[==][{bool}] true
||||
propbundle_Device.manufacturer[==][{str}] Acme
",
    );
    let record = &graph.records()[0];
    assert_eq!(record.classes, vec!["core_Trace", "propbundle_Device"]);
    assert_eq!(record.get("has_changed"), Some(&Value::Bool(true)));
    assert_eq!(record.get("manufacturer"), Some(&Value::Str("Acme".to_owned())));
    assert!(graph.diagnostics().is_empty());
}

#[test]
fn list_values_split_on_the_list_separator() {
    let graph = conv("propbundle_File.filename[==][{list:str}] a.raw[ | ]b.raw\n");
    assert_eq!(
        graph.records()[0].get("filename"),
        Some(&Value::List(vec![
            Value::Str("a.raw".to_owned()),
            Value::Str("b.raw".to_owned()),
        ]))
    );
}

#[test]
fn inherit_marker_takes_the_block_above() {
    let graph = conv(
        "\
|~~|
propbundle_Hash.hash_value[==][{str}] abc
|~~|
propbundle_File.hash[==][{|^^|}]
",
    );
    assert_eq!(graph.records().len(), 1);
    match graph.records()[0].get("hash") {
        Some(Value::EmbeddedObject(id)) => {
            let sub = graph.get(*id).unwrap();
            assert_eq!(sub.classes, vec!["propbundle_Hash"]);
            assert_eq!(sub.get("hash_value"), Some(&Value::Str("abc".to_owned())));
            assert_eq!(graph.embedded(), std::slice::from_ref(sub));
        }
        other => panic!("expected an embedded object, got {:?}", other),
    }
}

#[test]
fn tags_resolve_to_record_ids() {
    let graph = conv(INVESTIGATION);
    let tool = graph.by_tag("tool").unwrap();
    let action = &graph.records()[2];
    assert_eq!(action.get("performer"), Some(&Value::ObjectRef(tool.id)));
    let investigation = graph.by_tag("investigation").unwrap();
    assert_eq!(
        action.get("investigations"),
        Some(&Value::List(vec![Value::ObjectRef(investigation.id)]))
    );
}

#[test]
fn undefined_tag_is_an_error() {
    let err = convert_str(
        "core_Action.performer[==][{OBJ-REF}] my-tag\n",
        "props.conf",
        &ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedTagReference);
    assert_eq!(err.pass, 5);
}

#[test]
fn missing_trailing_newline_is_malformed() {
    let err = convert_str(
        "core_Trace.x[==][{int}] 1",
        "props.conf",
        &ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedDocument);
    assert_eq!(err.line, 1);
}

#[test]
fn merge_conflict_is_a_warning_unless_strict() {
    let src = "\
core_Tool.name[==][{str}] first
||||
propbundle_Software.name[==][{str}] second
";
    let graph = conv(src);
    assert_eq!(
        graph.records()[0].get("name"),
        Some(&Value::Str("second".to_owned()))
    );
    assert_eq!(graph.diagnostics().len(), 1);
    assert_eq!(graph.diagnostics()[0].kind, DiagnosticKind::MergeConflict);

    let strict = ParseOptions { strict_merge: true };
    let err = convert_str(src, "props.conf", &strict).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MergeConflict);
    assert_eq!(err.field.as_deref(), Some("propbundle_Software.name"));
}

#[test]
fn assignments_layer_over_a_converted_graph() {
    let mut graph = conv(INVESTIGATION);
    let assignments = [
        "core_Tool.version=2.0".parse::<Assignment>().unwrap(),
        "core_Trace.tool[==][{OBJ-REF}]=tool".parse::<Assignment>().unwrap(),
    ];
    apply_assignments(&mut graph, &assignments).unwrap();

    assert_eq!(
        graph.by_tag("tool").unwrap().get("version"),
        Some(&Value::Str("2.0".to_owned()))
    );
    let trace = graph.records().last().unwrap();
    assert_eq!(trace.classes, vec!["core_Trace"]);
    assert_eq!(
        trace.get("tool"),
        Some(&Value::ObjectRef(graph.by_tag("tool").unwrap().id))
    );
}

#[test]
fn failed_assignment_leaves_the_graph_untouched() {
    let mut graph = conv(INVESTIGATION);
    let before = serialize(&graph);
    let bad = ["core_Trace.tool[==][{OBJ-REF}]=nowhere"
        .parse::<Assignment>()
        .unwrap()];
    let err = apply_assignments(&mut graph, &bad).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedTagReference);
    assert_eq!(serialize(&graph), before);
}

/// A leaf block followed by `links` blocks that each take the one before.
fn block_chain(links: usize) -> String {
    let mut src = String::from("|~~|\nleaf.v[==][{int}] 0\n|~~|\n");
    for i in 0..links {
        src.push_str(&format!("|~~|\nc{}.child[==][{{|^^|}}]\n|~~|\n", i));
    }
    src.push_str("top.child[==][{|^^|}]\n");
    src
}

#[derive(Default)]
struct DepthCount {
    deepest: usize,
    entered: usize,
}

impl GraphVisitor for DepthCount {
    fn enter_record(&mut self, _record: &ObjectRecord, depth: usize) {
        self.deepest = self.deepest.max(depth);
        self.entered += 1;
    }
}

#[test]
fn long_block_chains_convert_without_deep_recursion() {
    let links = 20_000;
    let graph = conv(&block_chain(links));

    assert_eq!(graph.records().len(), 1);
    assert_eq!(graph.embedded().len(), links + 1);
    let top = &graph.records()[0];
    assert_eq!(top.id, ObjectId(links as u32 + 1));
    assert_eq!(top.get("child"), Some(&Value::EmbeddedObject(ObjectId(links as u32))));
    assert!(graph.diagnostics().is_empty());

    let mut count = DepthCount::default();
    graph.walk(&mut count);
    assert_eq!(count.deepest, links + 1);
    assert_eq!(count.entered, links + 2);

    let doc = serialize(&graph);
    assert_eq!(doc["embedded"].as_array().map(Vec::len), Some(links + 1));
    assert_eq!(
        doc["records"][0]["fields"][0]["value"],
        serde_json::json!({"type": "object", "id": links})
    );

    let text = emit(&graph).unwrap();
    let again = convert_str(&text, "emitted", &ParseOptions::default()).unwrap();
    assert!(graph.structurally_eq(&again));
    drop(again);
    drop(graph);
}
