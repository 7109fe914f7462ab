//! Type inference: this-type through amendment chains, expression and
//! expected types, operator typing, generic argument inference.

mod common;

use common::{host, tb};
use pkla_checker::Position;
use pkla_syntax::{BinaryOperator, ModuleClauseKind};

/// Module `M` defines `class C { x: Int }` and `c: C`; module
/// `N amends M { c { x = 5 } }`. The inferred type of `x` inside `N` is
/// `Int`, and the this-type at `x = 5` is a subtype of `C`.
#[test]
fn amends_chain_end_to_end() {
    let h = host();
    let mut mt = tb(&h.interner);
    let int_ty = mt.ty("Int");
    let class_x = mt.prop("x", Some(int_ty), None);
    let class_c = mt.class("C", pkla_syntax::Modifiers::empty(), None, vec![class_x]);
    let c_ty = mt.ty("C");
    let prop_c = mt.prop("c", Some(c_ty), None);
    let m_tree = mt.module(None, vec![class_c, prop_c]);
    let m = h.add("M.pkl", m_tree);

    let mut nt = tb(&h.interner);
    let five = nt.int(5);
    let override_x = nt.prop("x", None, Some(five));
    let c_body = nt.body(vec![override_x]);
    let override_c = nt.prop_body("c", None, c_body);
    let n_tree = nt.module(Some((ModuleClauseKind::Amends, "M.pkl")), vec![override_c]);
    let n = h.add("N.pkl", n_tree);

    // Find M's class C definition for the subtype check.
    let m_tree = h.analyzer.graph.tree(m).unwrap();
    let class_node = m_tree.children(m_tree.root())[0];
    let c_def = h.analyzer.lower_def(m, class_node, None);
    assert!(c_def.is_valid());
    let c_type = h.analyzer.types.class0(c_def);

    let this_ty = h.analyzer.this_type_at(Position::new(n, override_x), None);
    assert!(
        h.analyzer.is_subtype(this_ty, c_type),
        "this-type inside the amending body must be a subtype of C"
    );

    // The overridden property's declared type flows from C: the expected
    // type of its value is Int.
    let declared = h.analyzer.expected_type_at(Position::new(n, five), None);
    assert_eq!(declared, h.analyzer.db().int_type());

    // No diagnostics: 5 conforms to Int.
    let diags = h.analyzer.check_module(n, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
}

#[test]
fn new_expression_types_as_the_instantiated_class() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let name_prop = t.prop("name", Some(string_ty), None);
    let bird_class = t.class("Bird", pkla_syntax::Modifiers::empty(), None, vec![name_prop]);
    let bird_ty = t.ty("Bird");
    let body = t.body(vec![]);
    let new = t.new_expr(Some(bird_ty), body);
    let p = t.prop("p", None, Some(new));
    let tree = t.module(None, vec![bird_class, p]);
    let module = h.add("main.pkl", tree);

    let ty = h.analyzer.type_of_expr(Position::new(module, new), None);
    assert_eq!(h.analyzer.render(ty), "Bird");

    // Inside the body, `this` is the Bird under construction.
    let this_ty = h.analyzer.this_type_at(Position::new(module, body), None);
    assert_eq!(this_ty, ty);
}

#[test]
fn qualified_access_reads_class_members() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let name_prop = t.prop("name", Some(string_ty), None);
    let bird_class = t.class("Bird", pkla_syntax::Modifiers::empty(), None, vec![name_prop]);
    let bird_ty = t.ty("Bird");
    let bird = t.prop("bird", Some(bird_ty), None);
    let bird_access = t.access("bird");
    let name_access = t.qualified(bird_access, "name", false);
    let use_prop = t.prop("n", None, Some(name_access));
    let tree = t.module(None, vec![bird_class, bird, use_prop]);
    let module = h.add("main.pkl", tree);

    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, name_access), None),
        h.analyzer.db().string_type()
    );
}

#[test]
fn null_safe_access_propagates_nullability() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let name_prop = t.prop("name", Some(string_ty), None);
    let bird_class = t.class("Bird", pkla_syntax::Modifiers::empty(), None, vec![name_prop]);
    let bird_ty = t.ty("Bird");
    let optional_bird = t.ty_nullable(bird_ty);
    let bird = t.prop("bird", Some(optional_bird), None);
    let bird_access = t.access("bird");
    let name_access = t.qualified(bird_access, "name", true);
    let use_prop = t.prop("n", None, Some(name_access));
    let tree = t.module(None, vec![bird_class, bird, use_prop]);
    let module = h.add("main.pkl", tree);

    let ty = h.analyzer.type_of_expr(Position::new(module, name_access), None);
    assert_eq!(h.analyzer.render(ty), "String?");
}

#[test]
fn operator_typing() {
    let h = host();
    let mut t = tb(&h.interner);
    let one = t.int(1);
    let two = t.int(2);
    let sum = t.binop(BinaryOperator::Add, one, two);
    let int_sum = t.prop("intSum", None, Some(sum));

    let three = t.int(3);
    let half = t.float(0.5);
    let mixed = t.binop(BinaryOperator::Add, three, half);
    let float_sum = t.prop("floatSum", None, Some(mixed));

    let four = t.int(4);
    let five = t.int(5);
    let quotient = t.binop(BinaryOperator::Div, four, five);
    let div = t.prop("div", None, Some(quotient));

    let hello = t.string("hello");
    let six = t.int(6);
    let concat = t.binop(BinaryOperator::Add, hello, six);
    let text = t.prop("text", None, Some(concat));

    let lhs = t.int(7);
    let rhs = t.int(8);
    let cmp = t.binop(BinaryOperator::Lt, lhs, rhs);
    let flag = t.prop("flag", None, Some(cmp));

    let tree = t.module(None, vec![int_sum, float_sum, div, text, flag]);
    let module = h.add("main.pkl", tree);
    let db = h.analyzer.db();

    assert_eq!(h.analyzer.type_of_expr(Position::new(module, sum), None), db.int_type());
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, mixed), None),
        db.float_type()
    );
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, quotient), None),
        db.float_type()
    );
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, concat), None),
        db.string_type()
    );
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, cmp), None),
        db.boolean_type()
    );
}

#[test]
fn null_coalescing_strips_nullability() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let optional = t.ty_nullable(string_ty);
    let x = t.prop("x", Some(optional), None);
    let access = t.access("x");
    let fallback = t.string("default");
    let coalesce = t.binop(BinaryOperator::NullCoalesce, access, fallback);
    let y = t.prop("y", None, Some(coalesce));
    let tree = t.module(None, vec![x, y]);
    let module = h.add("main.pkl", tree);

    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, coalesce), None),
        h.analyzer.db().string_type()
    );
}

#[test]
fn subscript_on_listing_yields_element() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let listing_ty = t.ty_args("Listing", vec![string_ty]);
    let l = t.prop("l", Some(listing_ty), None);
    let receiver = t.access("l");
    let index = t.int(0);
    let subscript = t.b.n(pkla_syntax::NodeData::Subscript { receiver, index });
    let e = t.prop("e", None, Some(subscript));
    let tree = t.module(None, vec![l, e]);
    let module = h.add("main.pkl", tree);

    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, subscript), None),
        h.analyzer.db().string_type()
    );
}

#[test]
fn expected_type_flows_into_listing_elements() {
    let h = host();
    let mut t = tb(&h.interner);
    let int_ty = t.ty("Int");
    let listing_ty = t.ty_args("Listing", vec![int_ty]);
    let element_value = t.int(1);
    let element = t.element(element_value);
    let body = t.body(vec![element]);
    let new = t.new_expr(Some(listing_ty), body);
    let l = t.prop("l", None, Some(new));
    let tree = t.module(None, vec![l]);
    let module = h.add("main.pkl", tree);

    assert_eq!(
        h.analyzer
            .expected_type_at(Position::new(module, element_value), None),
        h.analyzer.db().int_type()
    );
}

#[test]
fn expected_type_for_call_arguments() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let param = t.param("s", Some(string_ty));
    let ret_ty = t.ty("String");
    let greet = t.method("greet", vec![], vec![param], false, Some(ret_ty), None);
    let arg = t.string("hi");
    let call = t.call("greet", vec![arg]);
    let use_prop = t.prop("use", None, Some(call));
    let tree = t.module(None, vec![greet, use_prop]);
    let module = h.add("main.pkl", tree);

    assert_eq!(
        h.analyzer.expected_type_at(Position::new(module, arg), None),
        h.analyzer.db().string_type()
    );
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, call), None),
        h.analyzer.db().string_type()
    );
}

/// `first(xs: List<T>): T` called with a `List<Int>` infers `T = Int`.
#[test]
fn generic_method_argument_inference() {
    let h = host();
    let mut t = tb(&h.interner);
    let tp = t.type_param("T");
    let t_ref = t.ty("T");
    let list_t = t.ty_args("List", vec![t_ref]);
    let param = t.param("xs", Some(list_t));
    let ret = t.ty("T");
    let first = t.method("first", vec![tp], vec![param], false, Some(ret), None);

    let int_ty = t.ty("Int");
    let list_int = t.ty_args("List", vec![int_ty]);
    let nums = t.prop("nums", Some(list_int), None);
    let arg = t.access("nums");
    let call = t.call("first", vec![arg]);
    let head = t.prop("head", None, Some(call));
    let tree = t.module(None, vec![first, nums, head]);
    let module = h.add("main.pkl", tree);

    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, call), None),
        h.analyzer.db().int_type()
    );
}

/// A variadic tail unions all excess argument types before unifying.
#[test]
fn variadic_inference_unions_excess_arguments() {
    let h = host();
    let mut t = tb(&h.interner);
    let tp = t.type_param("T");
    let t_ref = t.ty("T");
    let param = t.param("values", Some(t_ref));
    let ret = t.ty("T");
    let pick = t.method("pick", vec![tp], vec![param], true, Some(ret), None);

    let one = t.int(1);
    let half = t.float(0.5);
    let call = t.call("pick", vec![one, half]);
    let choice = t.prop("choice", None, Some(call));
    let tree = t.module(None, vec![pick, choice]);
    let module = h.add("main.pkl", tree);

    let db = h.analyzer.db();
    let expected = db.union2(db.int_type(), db.float_type());
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, call), None),
        expected
    );
}

#[test]
fn if_expression_unions_branches() {
    let h = host();
    let mut t = tb(&h.interner);
    let cond = t.b.n(pkla_syntax::NodeData::BoolLiteral(true));
    let then_v = t.int(1);
    let else_v = t.string("s");
    let if_node = t.if_expr(cond, then_v, else_v);
    let p = t.prop("p", None, Some(if_node));
    let tree = t.module(None, vec![p]);
    let module = h.add("main.pkl", tree);

    let db = h.analyzer.db();
    let ty = h.analyzer.type_of_expr(Position::new(module, if_node), None);
    // Int | "s" — a union containing the literal alternative.
    assert!(h.analyzer.is_subtype(db.int_type(), ty));
    let lit = h.analyzer.types.string_literal(h.atom("s"));
    assert!(h.analyzer.is_subtype(lit, ty));
    assert!(!h.analyzer.is_subtype(db.boolean_type(), ty));
}

#[test]
fn qualified_type_through_import() {
    let h = host();
    let mut libt = tb(&h.interner);
    let int_ty = libt.ty("Int");
    let size_prop = libt.prop("size", Some(int_ty), None);
    let widget = libt.class("Widget", pkla_syntax::Modifiers::empty(), None, vec![size_prop]);
    let lib_tree = libt.module(None, vec![widget]);
    h.add("lib.pkl", lib_tree);

    let mut t = tb(&h.interner);
    let import = t.import("lib.pkl", None, false);
    let widget_ty = t.ty_qualified("lib", "Widget");
    let w = t.prop("w", Some(widget_ty), None);
    let w_access = t.access("w");
    let size_access = t.qualified(w_access, "size", false);
    let use_prop = t.prop("s", None, Some(size_access));
    let tree = t.module_with_imports(None, vec![import], vec![w, use_prop]);
    let module = h.add("main.pkl", tree);

    let w_ty = h.analyzer.type_of_expr(Position::new(module, w_access), None);
    assert_eq!(h.analyzer.render(w_ty), "Widget");
    assert_eq!(
        h.analyzer.type_of_expr(Position::new(module, size_access), None),
        h.analyzer.db().int_type()
    );
}

#[test]
fn concurrent_queries_agree() {
    use rayon::prelude::*;

    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let int_ty = t.ty("Int");
    let union_ty = t.ty_union(string_ty, int_ty);
    let x = t.prop("x", Some(union_ty), None);
    let test_access = t.access("x");
    let test_string_ty = t.ty("String");
    let test = t.is_type(test_access, test_string_ty);
    let here = t.access("x");
    let and = t.binop(BinaryOperator::And, test, here);
    let probe = t.prop("probe", None, Some(and));
    let tree = t.module(None, vec![x, probe]);
    let module = h.add("main.pkl", tree);

    // Cold and warm caches must answer identically, from any thread.
    let expected = h.analyzer.db().string_type();
    let results: Vec<_> = (0..32)
        .into_par_iter()
        .map(|_| h.analyzer.type_of_expr(Position::new(module, here), None))
        .collect();
    assert!(results.into_iter().all(|ty| ty == expected));
}
