//! Diagnostic pass tests: the full error taxonomy.

mod common;

use common::{host, tb};
use pkla_common::diagnostics::codes;
use pkla_syntax::{Modifiers, ModuleClauseKind};

fn codes_of(diags: &[pkla_common::Diagnostic]) -> Vec<u32> {
    diags.iter().map(|d| d.code).collect()
}

/// `x: String(length > 3) = "ab"` is provably false: a hard violation.
#[test]
fn constraint_violation_on_provably_false() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let length = t.access("length");
    let three = t.int(3);
    let gt = t.binop(pkla_syntax::BinaryOperator::Gt, length, three);
    let constrained = t.ty_constrained(string_ty, vec![gt]);
    let value = t.string("ab");
    let x = t.prop("x", Some(constrained), Some(value));
    let tree = t.module(None, vec![x]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::CONSTRAINT_VIOLATION]);
    assert!(diags[0].message_text.contains("length > 3"));
}

/// An opaque value cannot be proven to violate the constraint: silence.
#[test]
fn undecidable_constraint_stays_silent() {
    let h = host();
    let mut t = tb(&h.interner);
    let source_string_ty = t.ty("String");
    let source = t.prop("source", Some(source_string_ty), None);
    let string_ty = t.ty("String");
    let length = t.access("length");
    let three = t.int(3);
    let gt = t.binop(pkla_syntax::BinaryOperator::Gt, length, three);
    let constrained = t.ty_constrained(string_ty, vec![gt]);
    let value = t.access("source");
    let x = t.prop("x", Some(constrained), Some(value));
    let tree = t.module(None, vec![source, x]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
}

#[test]
fn satisfied_constraint_stays_silent() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let length = t.access("length");
    let three = t.int(3);
    let gt = t.binop(pkla_syntax::BinaryOperator::Gt, length, three);
    let constrained = t.ty_constrained(string_ty, vec![gt]);
    let value = t.string("abcd");
    let x = t.prop("x", Some(constrained), Some(value));
    let tree = t.module(None, vec![x]);
    let module = h.add("main.pkl", tree);

    assert!(h.analyzer.check_module(module, None).is_empty());
}

/// In a union of constrained alternatives, the diagnostic carries the last
/// tracked alternative's constraint text (override semantics), and the
/// union only fails when every alternative fails.
#[test]
fn union_constraint_override_reports_last_alternative() {
    let h = host();
    let mut t = tb(&h.interner);
    // x: String(length > 5)|String(length > 9) = "ab"
    let s1 = t.ty("String");
    let l1 = t.access("length");
    let five = t.int(5);
    let gt5 = t.binop(pkla_syntax::BinaryOperator::Gt, l1, five);
    let alt1 = t.ty_constrained(s1, vec![gt5]);
    let s2 = t.ty("String");
    let l2 = t.access("length");
    let nine = t.int(9);
    let gt9 = t.binop(pkla_syntax::BinaryOperator::Gt, l2, nine);
    let alt2 = t.ty_constrained(s2, vec![gt9]);
    let union_ty = t.ty_union(alt1, alt2);
    let value = t.string("ab");
    let x = t.prop("x", Some(union_ty), Some(value));
    let tree = t.module(None, vec![x]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::CONSTRAINT_VIOLATION]);
    // Both alternatives fail; the second one is the tracked failure.
    assert!(diags[0].message_text.contains("length > 9"));
    assert!(!diags[0].message_text.contains("length > 5"));
}

#[test]
fn union_passes_when_any_alternative_accepts() {
    let h = host();
    let mut t = tb(&h.interner);
    // x: String(length > 5)|String(length > 1) = "abc"
    let s1 = t.ty("String");
    let l1 = t.access("length");
    let five = t.int(5);
    let gt5 = t.binop(pkla_syntax::BinaryOperator::Gt, l1, five);
    let alt1 = t.ty_constrained(s1, vec![gt5]);
    let s2 = t.ty("String");
    let l2 = t.access("length");
    let one = t.int(1);
    let gt1 = t.binop(pkla_syntax::BinaryOperator::Gt, l2, one);
    let alt2 = t.ty_constrained(s2, vec![gt1]);
    let union_ty = t.ty_union(alt1, alt2);
    let value = t.string("abc");
    let x = t.prop("x", Some(union_ty), Some(value));
    let tree = t.module(None, vec![x]);
    let module = h.add("main.pkl", tree);

    assert!(h.analyzer.check_module(module, None).is_empty());
}

/// `x: String = 5`: no common subtype, a hard mismatch.
#[test]
fn impossible_mismatch_is_hard_error() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let value = t.int(5);
    let x = t.prop("x", Some(string_ty), Some(value));
    let tree = t.module(None, vec![x]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::TYPE_MISMATCH]);
}

/// `y: String = maybe` with `maybe: String?`: only nullability separates
/// them, so a weak warning.
#[test]
fn narrowable_mismatch_is_weak_warning() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let optional = t.ty_nullable(string_ty);
    let maybe = t.prop("maybe", Some(optional), None);
    let y_string_ty = t.ty("String");
    let value = t.access("maybe");
    let y = t.prop("y", Some(y_string_ty), Some(value));
    let tree = t.module(None, vec![maybe, y]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::TYPE_MISMATCH_WEAK]);
}

#[test]
fn instantiating_an_abstract_class_is_reported() {
    let h = host();
    let mut t = tb(&h.interner);
    let abstract_class = t.class("Shape", Modifiers::ABSTRACT, None, vec![]);
    let shape_ty = t.ty("Shape");
    let body = t.body(vec![]);
    let new = t.new_expr(Some(shape_ty), body);
    let p = t.prop("p", None, Some(new));
    let tree = t.module(None, vec![abstract_class, p]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::INVALID_INSTANTIATION]);
}

#[test]
fn amending_a_string_is_reported() {
    let h = host();
    let mut t = tb(&h.interner);
    let string_ty = t.ty("String");
    let s = t.prop("s", Some(string_ty), None);
    let parent = t.access("s");
    let body = t.body(vec![]);
    let amend = t.amend_expr(parent, body);
    let p = t.prop("p", None, Some(amend));
    let tree = t.module(None, vec![s, p]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::INVALID_AMENDMENT]);
}

#[test]
fn unresolved_reference_severity_follows_receiver_openness() {
    let h = host();
    let mut t = tb(&h.interner);
    // Module level: closed receiver, hard error.
    let missing = t.access("missing");
    let bad = t.prop("bad", None, Some(missing));
    // Inside `new Dynamic {}`: open receiver, warning.
    let missing2 = t.access("missing2");
    let p = t.prop("p", None, Some(missing2));
    let dynamic_ty = t.ty("Dynamic");
    let body = t.body(vec![p]);
    let new = t.new_expr(Some(dynamic_ty), body);
    let d = t.prop("d", None, Some(new));
    let tree = t.module(None, vec![bad, d]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    let mut codes = codes_of(&diags);
    codes.sort_unstable();
    assert_eq!(
        codes,
        vec![codes::UNRESOLVED_REFERENCE, codes::UNRESOLVED_REFERENCE_DYNAMIC]
    );
}

#[test]
fn alias_cycle_is_a_diagnostic_not_an_overflow() {
    let h = host();
    let mut t = tb(&h.interner);
    let self_ref = t.ty("Loop");
    let alias = t.type_alias("Loop", self_ref);
    let tree = t.module(None, vec![alias]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert!(codes_of(&diags).contains(&codes::CYCLIC_DECLARATION));
}

#[test]
fn fixed_property_override_is_reported() {
    let h = host();
    let mut pt = tb(&h.interner);
    let int_ty = pt.ty("Int");
    let one = pt.int(1);
    let fixed_prop = pt.prop_full("f", Modifiers::FIXED, Some(int_ty), Some(one), None);
    let parent_tree = pt.module(None, vec![fixed_prop]);
    h.add("parent.pkl", parent_tree);

    let mut t = tb(&h.interner);
    let two = t.int(2);
    let override_f = t.prop("f", None, Some(two));
    let tree = t.module(Some((ModuleClauseKind::Amends, "parent.pkl")), vec![override_f]);
    let module = h.add("child.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert!(codes_of(&diags).contains(&codes::FIXED_PROPERTY_OVERRIDE));
}

#[test]
fn missing_parent_property_on_amends() {
    let h = host();
    let mut pt = tb(&h.interner);
    let int_ty = pt.ty("Int");
    let required = pt.prop("required", Some(int_ty), None);
    let parent_tree = pt.module(None, vec![required]);
    h.add("parent.pkl", parent_tree);

    let mut t = tb(&h.interner);
    let tree = t.module(Some((ModuleClauseKind::Amends, "parent.pkl")), vec![]);
    let module = h.add("child.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert!(codes_of(&diags).contains(&codes::MISSING_PARENT_PROPERTY));

    // Defining the property satisfies the completeness check.
    let mut t2 = tb(&h.interner);
    let five = t2.int(5);
    let defined = t2.prop("required", None, Some(five));
    let tree2 = t2.module(Some((ModuleClauseKind::Amends, "parent.pkl")), vec![defined]);
    let module2 = h.add("child2.pkl", tree2);
    assert!(h.analyzer.check_module(module2, None).is_empty());
}

#[test]
fn const_context_rejects_non_const_references() {
    let h = host();
    let mut t = tb(&h.interner);
    let one = t.int(1);
    let plain = t.prop("plain", None, Some(one));
    let two = t.int(2);
    let constant = t.prop_full("constant", Modifiers::CONST, None, Some(two), None);

    let bad_ref = t.access("plain");
    let bad = t.prop_full("bad", Modifiers::CONST, None, Some(bad_ref), None);
    let good_ref = t.access("constant");
    let good = t.prop_full("good", Modifiers::CONST, None, Some(good_ref), None);
    let tree = t.module(None, vec![plain, constant, bad, good]);
    let module = h.add("main.pkl", tree);

    let diags = h.analyzer.check_module(module, None);
    assert_eq!(codes_of(&diags), vec![codes::CONST_REFERENCE_VIOLATION]);
    assert!(diags[0].message_text.contains("plain"));
}
