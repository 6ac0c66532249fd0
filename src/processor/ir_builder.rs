//! Merges per-file ASTs into one validated [`IrModule`].
//!
//! Every check runs to completion and the errors of all of them are returned
//! together. Order of reporting: duplicates, then unresolved references, bad
//! defaults and misplaced validators, then recursive types.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::ast::{Field, Literal, SchemaFile, TypeDecl, TypeRef, Validator};
use super::ir::*;
use crate::error::{DefinitionKind, IrError};

pub fn build(files: &[SchemaFile]) -> Result<IrModule, Vec<IrError>> {
    let mut errors = Vec::new();

    let decls = collect_decls(files, &mut errors);
    let mut types = resolve_decls(&decls, &mut errors);
    check_direct_cycles(&types, &mut errors);
    mark_recursive_fields(&mut types);

    if errors.is_empty() {
        Ok(IrModule::new(types))
    } else {
        Err(errors)
    }
}

// ── 1. duplicates ────────────────────────────────────────────────────

fn collect_decls<'a>(
    files: &'a [SchemaFile],
    errors: &mut Vec<IrError>,
) -> BTreeMap<TypeId, &'a TypeDecl> {
    let mut decls: BTreeMap<TypeId, &TypeDecl> = BTreeMap::new();

    for decl in files.iter().flat_map(|file| file.decls.iter()) {
        match decls.entry(TypeId::new(&decl.namespace, &decl.name)) {
            Entry::Vacant(slot) => {
                slot.insert(decl);
            }
            Entry::Occupied(first) => errors.push(IrError::DuplicateDefinition {
                kind: DefinitionKind::Type,
                name: first.key().to_string(),
                first: first.get().span.clone(),
                second: decl.span.clone(),
            }),
        }

        let mut seen: HashMap<&str, &Field> = HashMap::new();
        for field in &decl.fields {
            if let Some(first) = seen.get(field.name.as_str()) {
                errors.push(IrError::DuplicateDefinition {
                    kind: DefinitionKind::Field,
                    name: format!(
                        "{}.{}",
                        TypeId::new(&decl.namespace, &decl.name),
                        field.name
                    ),
                    first: first.span.clone(),
                    second: field.span.clone(),
                });
            } else {
                seen.insert(field.name.as_str(), field);
            }
        }
    }

    decls
}

// ── 2. resolution ────────────────────────────────────────────────────

fn resolve_decls(
    decls: &BTreeMap<TypeId, &TypeDecl>,
    errors: &mut Vec<IrError>,
) -> BTreeMap<TypeId, IrTypeDecl> {
    let mut types = BTreeMap::new();

    for (id, decl) in decls {
        let mut fields = Vec::with_capacity(decl.fields.len());
        let mut seen = HashSet::new();

        for field in &decl.fields {
            if !seen.insert(field.name.as_str()) {
                continue; // reported in step 1
            }
            let field_id = FieldId {
                owner: id.clone(),
                name: field.name.clone(),
            };

            let ty = match resolve(&field.ty, &id.namespace, decls) {
                Ok(ty) => ty,
                Err(reference) => {
                    errors.push(IrError::UnresolvedTypeReference {
                        field: field_id.to_string(),
                        reference,
                        span: field.span.clone(),
                    });
                    continue;
                }
            };

            if let Some(value) = &field.default {
                if !default_fits(&ty, value) {
                    errors.push(IrError::InvalidDefault {
                        field: field_id.to_string(),
                        ty: ty.to_string(),
                        value: value.to_string(),
                        span: field.span.clone(),
                    });
                }
            }

            check_validators(field, &field_id, &ty, errors);

            fields.push(IrField {
                id: field_id,
                name: field.name.clone(),
                ty,
                optional: field.optional,
                default: field.default.clone(),
                validators: field.validators.clone(),
                doc: field.doc.clone(),
                recursive: false,
                span: field.span.clone(),
            });
        }

        fields.sort_by(|a, b| a.name.cmp(&b.name));
        types.insert(
            id.clone(),
            IrTypeDecl {
                id: id.clone(),
                fields,
                doc: decl.doc.clone(),
                span: decl.span.clone(),
            },
        );
    }

    types
}

/// Unqualified names try primitives, then the field's own namespace, then the
/// root namespace. Returns the reference as written when nothing matches.
fn resolve(
    ty: &TypeRef,
    namespace: &str,
    decls: &BTreeMap<TypeId, &TypeDecl>,
) -> Result<IrType, String> {
    match ty {
        TypeRef::List(inner) => {
            resolve(inner, namespace, decls).map(|t| IrType::List(Box::new(t)))
        }
        TypeRef::Named(path) => {
            let candidates = match path.split_last() {
                Some((name, [])) => {
                    if let Some(primitive) = Primitive::from_name(name) {
                        return Ok(IrType::Primitive(primitive));
                    }
                    vec![TypeId::new(namespace, name.as_str()), TypeId::new("", name.as_str())]
                }
                Some((name, ns)) => vec![TypeId::new(ns.join("."), name.as_str())],
                None => vec![],
            };
            candidates
                .into_iter()
                .find(|id| decls.contains_key(id))
                .map(IrType::Named)
                .ok_or_else(|| ty.to_string())
        }
    }
}

fn default_fits(ty: &IrType, value: &Literal) -> bool {
    match (ty, value) {
        (IrType::Primitive(Primitive::Any), _) => true,
        (IrType::Primitive(Primitive::Int), Literal::Int(_)) => true,
        (IrType::Primitive(Primitive::Float), Literal::Int(_) | Literal::Float(_)) => true,
        (IrType::Primitive(Primitive::Bool), Literal::Bool(_)) => true,
        (IrType::Primitive(Primitive::String), Literal::Str(_)) => true,
        _ => false,
    }
}

/// Validators check a single scalar value, so list and named fields take none.
fn validator_fits(ty: &IrType, validator: Validator) -> bool {
    match (validator, ty) {
        (Validator::Number, IrType::Primitive(Primitive::Int | Primitive::Float)) => true,
        (Validator::Port, IrType::Primitive(Primitive::Int)) => true,
        (Validator::String | Validator::Url, IrType::Primitive(Primitive::String)) => true,
        _ => false,
    }
}

fn check_validators(field: &Field, field_id: &FieldId, ty: &IrType, errors: &mut Vec<IrError>) {
    for &validator in &field.validators {
        if !validator_fits(ty, validator) {
            errors.push(IrError::InvalidValidator {
                field: field_id.to_string(),
                validator,
                ty: ty.to_string(),
                span: field.span.clone(),
            });
        }
    }

    let port = match &field.default {
        Some(Literal::Int(v)) if field.validators.contains(&Validator::Port) => Some(*v),
        _ => None,
    };
    if let Some(port) = port.filter(|p| !(0..=65535).contains(p)) {
        errors.push(IrError::InvalidDefault {
            field: field_id.to_string(),
            ty: format!("{ty} {}", Validator::Port),
            value: port.to_string(),
            span: field.span.clone(),
        });
    }
}

// ── 3. cycles ────────────────────────────────────────────────────────

/// Adjacency lists over the positions of `types`' keys.
fn graph(
    types: &BTreeMap<TypeId, IrTypeDecl>,
    edge: impl Fn(&IrField) -> Option<&TypeId>,
) -> Vec<Vec<usize>> {
    let position: HashMap<&TypeId, usize> =
        types.keys().enumerate().map(|(i, id)| (id, i)).collect();
    types
        .values()
        .map(|decl| {
            let mut targets: Vec<usize> = decl
                .fields
                .iter()
                .filter_map(&edge)
                .filter_map(|target| position.get(target).copied())
                .collect();
            targets.sort_unstable();
            targets.dedup();
            targets
        })
        .collect()
}

fn direct_target(field: &IrField) -> Option<&TypeId> {
    match &field.ty {
        IrType::Named(target) if !field.optional => Some(target),
        _ => None,
    }
}

fn check_direct_cycles(types: &BTreeMap<TypeId, IrTypeDecl>, errors: &mut Vec<IrError>) {
    let adj = graph(types, direct_target);
    let ids: Vec<&TypeId> = types.keys().collect();

    for scc in strongly_connected(&adj) {
        let start = scc[0];
        if scc.len() == 1 && !adj[start].contains(&start) {
            continue;
        }

        let members: HashSet<usize> = scc.iter().copied().collect();
        let cycle = find_cycle(&adj, start, &members);
        let next = ids[cycle[1]];
        let decl = &types[ids[start]];
        let span = decl
            .fields
            .iter()
            .find(|field| direct_target(field) == Some(next))
            .map_or_else(|| decl.span.clone(), |field| field.span.clone());

        errors.push(IrError::InvalidRecursiveType {
            ty: ids[start].to_string(),
            cycle: cycle.iter().map(|&i| ids[i].to_string()).collect(),
            span,
        });
    }
}

/// A closed walk `start -> … -> start` inside one strongly connected component.
fn find_cycle(adj: &[Vec<usize>], start: usize, members: &HashSet<usize>) -> Vec<usize> {
    fn walk(
        adj: &[Vec<usize>],
        v: usize,
        start: usize,
        members: &HashSet<usize>,
        visited: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> bool {
        for &w in &adj[v] {
            if !members.contains(&w) {
                continue;
            }
            if w == start {
                return true;
            }
            if visited.insert(w) {
                path.push(w);
                if walk(adj, w, start, members, visited, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    let mut path = vec![start];
    let mut visited = HashSet::from([start]);
    walk(adj, start, start, members, &mut visited, &mut path);
    path.push(start);
    path
}

/// Tarjan's algorithm. Components and their members come back sorted.
fn strongly_connected(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State<'a> {
        adj: &'a [Vec<usize>],
        next: usize,
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        stack: Vec<usize>,
        on_stack: Vec<bool>,
        sccs: Vec<Vec<usize>>,
    }

    fn visit(s: &mut State<'_>, v: usize) {
        s.index[v] = Some(s.next);
        s.low[v] = s.next;
        s.next += 1;
        s.stack.push(v);
        s.on_stack[v] = true;

        for i in 0..s.adj[v].len() {
            let w = s.adj[v][i];
            match s.index[w] {
                None => {
                    visit(s, w);
                    s.low[v] = s.low[v].min(s.low[w]);
                }
                Some(iw) if s.on_stack[w] => s.low[v] = s.low[v].min(iw),
                Some(_) => {}
            }
        }

        if s.index[v] == Some(s.low[v]) {
            let mut scc = Vec::new();
            while let Some(w) = s.stack.pop() {
                s.on_stack[w] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            scc.sort_unstable();
            s.sccs.push(scc);
        }
    }

    let n = adj.len();
    let mut state = State {
        adj,
        next: 0,
        index: vec![None; n],
        low: vec![0; n],
        stack: Vec::new(),
        on_stack: vec![false; n],
        sccs: Vec::new(),
    };
    for v in 0..n {
        if state.index[v].is_none() {
            visit(&mut state, v);
        }
    }
    state.sccs.sort();
    state.sccs
}

// ── recursion marking ────────────────────────────────────────────────

fn mark_recursive_fields(types: &mut BTreeMap<TypeId, IrTypeDecl>) {
    let adj = graph(types, |field| field.ty.named_target());
    let ids: Vec<TypeId> = types.keys().cloned().collect();

    let mut component: HashMap<&TypeId, usize> = HashMap::new();
    for (c, scc) in strongly_connected(&adj).iter().enumerate() {
        for &v in scc {
            component.insert(&ids[v], c);
        }
    }

    for decl in types.values_mut() {
        let own = component.get(&decl.id).copied();
        for field in &mut decl.fields {
            field.recursive = field
                .ty
                .named_target()
                .is_some_and(|target| component.get(target).copied() == own && own.is_some());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::processor::schema_parser::parse;

    fn files(sources: &[(&str, &str)]) -> Vec<SchemaFile> {
        sources
            .iter()
            .map(|(path, src)| parse(Path::new(path), src).unwrap())
            .collect()
    }

    fn build_one(src: &str) -> Result<IrModule, Vec<IrError>> {
        build(&files(&[("test.ath", src)]))
    }

    fn field<'a>(ir: &'a IrModule, ty: &str, name: &str) -> &'a IrField {
        ir.types()
            .find(|d| d.id.to_string() == ty)
            .and_then(|d| d.fields.iter().find(|f| f.name == name))
            .unwrap()
    }

    #[test]
    fn builds_point() {
        let ir = build_one("type Point { y: int, x: int }").unwrap();

        assert_eq!(ir.len(), 1);
        let point = ir.get(&TypeId::new("", "Point")).unwrap();
        let names: Vec<_> = point.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(point.fields[0].ty, IrType::Primitive(Primitive::Int));
        assert_eq!(point.fields[0].id.to_string(), "Point.x");
    }

    #[test]
    fn duplicate_type_across_files() {
        let errors = build(&files(&[
            ("a.ath", "type Point { x: int }"),
            ("b.ath", "\n\ntype Point { y: int }"),
        ]))
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        match &errors[0] {
            IrError::DuplicateDefinition {
                kind,
                name,
                first,
                second,
            } => {
                assert_eq!(*kind, DefinitionKind::Type);
                assert_eq!(name, "Point");
                assert_eq!(first.file, Path::new("a.ath"));
                assert_eq!((second.file.as_path(), second.line), (Path::new("b.ath"), 3));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn same_name_in_different_namespaces_is_fine() {
        let ir = build(&files(&[
            ("a.ath", "namespace a; type Point { x: int }"),
            ("b.ath", "namespace b; type Point { x: int }"),
        ]))
        .unwrap();
        assert_eq!(ir.len(), 2);
        assert_eq!(ir.namespaces().keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_field() {
        let errors = build_one("type P { x: int, x: float }").unwrap_err();
        match &errors[..] {
            [IrError::DuplicateDefinition { kind, name, .. }] => {
                assert_eq!(*kind, DefinitionKind::Field);
                assert_eq!(name, "P.x");
            }
            other => panic!("unexpected errors {other:?}"),
        }
    }

    #[test]
    fn unresolved_reference_reports_field_location() {
        let errors = build_one("type Line {\n  from: Point,\n  to: Point,\n}").unwrap_err();

        assert_eq!(errors.len(), 2);
        match &errors[0] {
            IrError::UnresolvedTypeReference {
                field,
                reference,
                span,
            } => {
                assert_eq!(field, "Line.from");
                assert_eq!(reference, "Point");
                assert_eq!((span.line, span.column), (2, 3));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn resolution_order_and_qualified_names() {
        let ir = build(&files(&[
            ("root.ath", "type Id { v: string } type Shared { v: int }"),
            (
                "geo.ath",
                "namespace geo; type Id { v: int } \
                 type Place { id: Id, shared: Shared, other: geo.Id }",
            ),
            ("use.ath", "type User { home: geo.Place, id: Id }"),
        ]))
        .unwrap();

        assert_eq!(field(&ir, "geo.Place", "id").ty, IrType::Named(TypeId::new("geo", "Id")));
        assert_eq!(field(&ir, "geo.Place", "shared").ty, IrType::Named(TypeId::new("", "Shared")));
        assert_eq!(field(&ir, "geo.Place", "other").ty, IrType::Named(TypeId::new("geo", "Id")));
        assert_eq!(field(&ir, "User", "home").ty, IrType::Named(TypeId::new("geo", "Place")));
        assert_eq!(field(&ir, "User", "id").ty, IrType::Named(TypeId::new("", "Id")));
        assert_eq!(ir.foreign_namespaces("geo").into_iter().collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn forward_references_across_files() {
        let ir = build(&files(&[
            ("a.ath", "type A { b: B }"),
            ("b.ath", "type B { v: int }"),
        ]))
        .unwrap();
        assert_eq!(field(&ir, "A", "b").ty, IrType::Named(TypeId::new("", "B")));
    }

    #[test]
    fn direct_self_reference_is_rejected() {
        let errors = build_one("type A { a: A }").unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            IrError::InvalidRecursiveType { ty, cycle, .. } => {
                assert_eq!(ty, "A");
                assert_eq!(cycle, &vec!["A".to_string(), "A".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn optional_and_list_self_references_are_kept() {
        let ir = build_one("type Node { next: Node?, children: [Node], value: int }").unwrap();

        let next = field(&ir, "Node", "next");
        assert!(next.optional);
        assert!(next.recursive);
        assert_eq!(next.ty, IrType::Named(TypeId::new("", "Node")));
        assert!(field(&ir, "Node", "children").recursive);
        assert!(!field(&ir, "Node", "value").recursive);
    }

    #[test]
    fn mutual_cycle_is_reported_once() {
        let errors = build_one("type B { a: A }\ntype A { b: B }\ntype C { a: A }").unwrap_err();

        assert_eq!(errors.len(), 1);
        match &errors[0] {
            IrError::InvalidRecursiveType { ty, cycle, span } => {
                assert_eq!(ty, "A");
                assert_eq!(cycle.join(" -> "), "A -> B -> A");
                assert_eq!(span.line, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cycle_broken_by_optional_marks_both_sides() {
        let src = "type A { b: B, leaf: Leaf }\ntype B { a: A? }\ntype Leaf { v: int }";
        let ir = build_one(src).unwrap();
        assert!(field(&ir, "A", "b").recursive);
        assert!(field(&ir, "B", "a").recursive);
        assert!(!field(&ir, "A", "leaf").recursive);
    }

    #[test]
    fn defaults_are_type_checked() {
        let src = r#"type T {
            a: int = 1,
            b: float = 2,
            c: string = 3,
            d: bool = "yes",
            e: any = "x",
            f: [int] = 1,
        }"#;
        let errors = build_one(src).unwrap_err();
        let bad: Vec<_> = errors
            .iter()
            .map(|e| match e {
                IrError::InvalidDefault { field, .. } => field.as_str(),
                other => panic!("unexpected error {other:?}"),
            })
            .collect();
        assert_eq!(bad, vec!["T.c", "T.d", "T.f"]);
    }

    #[test]
    fn validators_are_kept_on_the_field() {
        let ir = build_one("type S { port: int = 80 @port, home: string @url @string }").unwrap();

        assert_eq!(field(&ir, "S", "port").validators, vec![Validator::Port]);
        assert_eq!(
            field(&ir, "S", "home").validators,
            vec![Validator::Url, Validator::String]
        );
    }

    #[test]
    fn validators_must_fit_the_field_type() {
        let src = r#"type T {
            a: float @number,
            b: float @port,
            c: int @url,
            d: [string] @string,
            e: any @number,
            f: T? @string,
        }"#;
        let errors = build_one(src).unwrap_err();
        let bad: Vec<_> = errors
            .iter()
            .map(|e| match e {
                IrError::InvalidValidator { field, validator, .. } => {
                    format!("{field} {validator}")
                }
                other => panic!("unexpected error {other:?}"),
            })
            .collect();
        assert_eq!(bad, ["T.b @port", "T.c @url", "T.d @string", "T.e @number", "T.f @string"]);
        assert_eq!(
            errors[0].to_string(),
            "test.ath:3:13: validator `@port` cannot check field `T.b` of type `float`"
        );
    }

    #[test]
    fn port_default_must_be_a_port() {
        let errors = build_one("type S { a: int = 65535 @port, b: int = -1 @port }").unwrap_err();

        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(
            errors[0].to_string(),
            "test.ath:1:32: default value -1 does not fit field `S.b` of type `int @port`"
        );
    }

    #[test]
    fn all_checks_report_together() {
        let src = "type A { a: A, x: Missing }\ntype A { y: int }";
        let errors = build_one(src).unwrap_err();

        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(matches!(errors[0], IrError::DuplicateDefinition { .. }));
        assert!(matches!(errors[1], IrError::UnresolvedTypeReference { .. }));
        assert!(matches!(errors[2], IrError::InvalidRecursiveType { .. }));
    }

    #[test]
    fn order_of_files_and_fields_does_not_matter() {
        let a = "namespace geo; type Point { x: int, y: int }";
        let b = "type Shape { center: geo.Point, name: string? }";
        let a_shuffled = "namespace geo; type Point { y: int, x: int }";
        let b_shuffled = "type Shape { name: string?, center: geo.Point }";

        let ir1 = build(&files(&[("a.ath", a), ("b.ath", b)])).unwrap();
        let ir2 = build(&files(&[("b.ath", b_shuffled), ("a.ath", a_shuffled)])).unwrap();

        let ids = |ir: &IrModule| -> Vec<String> {
            ir.types()
                .flat_map(|d| d.fields.iter().map(|f| f.id.to_string()))
                .collect()
        };
        assert_eq!(ids(&ir1), ids(&ir2));
        assert_eq!(ids(&ir1), vec!["Shape.center", "Shape.name", "geo.Point.x", "geo.Point.y"]);
    }

    #[test]
    fn every_reference_resolves_inside_the_ir() {
        let ir = build(&files(&[
            ("a.ath", "namespace net; type Host { name: string, peers: [Host], parent: Host? }"),
            ("b.ath", "type Cluster { hosts: [net.Host], leader: net.Host }"),
        ]))
        .unwrap();

        for decl in ir.types() {
            for field in &decl.fields {
                if let Some(target) = field.ty.named_target() {
                    assert!(ir.get(target).is_some(), "{} is dangling", field.id);
                }
            }
        }
    }
}
