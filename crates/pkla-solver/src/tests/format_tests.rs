use super::Fixture;
use crate::format::TypeFormatter;
use crate::types::TypeId;

#[test]
fn renders_sentinels_and_classes() {
    let f = Fixture::new();
    let db = f.db();
    let fmt = TypeFormatter::new(db);
    assert_eq!(fmt.render(TypeId::UNKNOWN), "unknown");
    assert_eq!(fmt.render(TypeId::NOTHING), "nothing");
    assert_eq!(fmt.render(db.string_type()), "String");
    assert_eq!(
        fmt.render(f.types.class(f.builtins.listing, &[db.int_type()])),
        "Listing<Int>"
    );
    assert_eq!(
        fmt.render(
            f.types
                .class(f.builtins.mapping, &[db.string_type(), db.int_type()])
        ),
        "Mapping<String, Int>"
    );
}

#[test]
fn renders_string_literal_unions() {
    let f = Fixture::new();
    let db = f.db();
    let fmt = TypeFormatter::new(db);
    let union = db.union(vec![f.lit("north"), f.lit("south"), f.lit("east")]);
    assert_eq!(fmt.render(union), "\"north\"|\"south\"|\"east\"");
}

#[test]
fn renders_nullable_unions_with_question_mark() {
    let f = Fixture::new();
    let db = f.db();
    let fmt = TypeFormatter::new(db);
    assert_eq!(fmt.render(db.nullable(db.string_type())), "String?");
    let wide = db.union(vec![db.string_type(), db.int_type(), db.null_type()]);
    assert_eq!(fmt.render(wide), "(String|Int)?");
}

#[test]
fn renders_functions_and_constraints() {
    let f = Fixture::new();
    let db = f.db();
    let fmt = TypeFormatter::new(db);
    let func = f
        .types
        .function(&[db.int_type(), db.string_type()], db.boolean_type());
    assert_eq!(fmt.render(func), "(Int, String) -> Boolean");

    let constrained = f.types.constrained(db.string_type(), &[f.length_gt(3)]);
    assert_eq!(fmt.render(constrained), "String(length > 3)");
}

#[test]
fn renders_dangling_as_unknown() {
    let f = Fixture::new();
    let fmt = TypeFormatter::new(f.db());
    assert_eq!(fmt.render(TypeId(9999)), "unknown");
}
