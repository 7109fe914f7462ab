//! Canonical type rendering.
//!
//! One displayable form used by diagnostics and documentation alike:
//! string-literal unions render as `"a"|"b"|"c"`, a binary union with
//! `Null` renders as `T?` (parenthesized for wider unions), constrained
//! types as `Base(constraintSource)`.

use crate::db::TypeDatabase;
use crate::types::{TypeData, TypeId};
use pkla_common::limits::MAX_SUBTYPE_DEPTH;

pub struct TypeFormatter<'a> {
    db: TypeDatabase<'a>,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(db: TypeDatabase<'a>) -> Self {
        Self { db }
    }

    pub fn render(&self, ty: TypeId) -> String {
        self.render_at(ty, 0)
    }

    fn render_at(&self, ty: TypeId, depth: u32) -> String {
        if depth > MAX_SUBTYPE_DEPTH {
            return "...".to_string();
        }
        let Some(data) = self.db.lookup(ty) else {
            return "unknown".to_string();
        };
        match data {
            TypeData::Unknown => "unknown".to_string(),
            TypeData::Nothing => "nothing".to_string(),
            TypeData::Class { def, args } => {
                let name = self.db.strings.resolve(self.db.defs.name(def));
                let args = self.db.types.type_list(args);
                if args.is_empty() {
                    name.to_string()
                } else {
                    let rendered: Vec<String> = args
                        .iter()
                        .map(|&a| self.render_at(a, depth + 1))
                        .collect();
                    format!("{}<{}>", name, rendered.join(", "))
                }
            }
            TypeData::Module { def } => {
                let name = self.db.strings.resolve(self.db.defs.name(def));
                if name.is_empty() {
                    "module".to_string()
                } else {
                    name.to_string()
                }
            }
            TypeData::Alias { def, args } => {
                let name = self.db.strings.resolve(self.db.defs.name(def));
                let args = self.db.types.type_list(args);
                if args.is_empty() {
                    name.to_string()
                } else {
                    let rendered: Vec<String> = args
                        .iter()
                        .map(|&a| self.render_at(a, depth + 1))
                        .collect();
                    format!("{}<{}>", name, rendered.join(", "))
                }
            }
            TypeData::Variable { def } => {
                self.db.strings.resolve(self.db.defs.name(def)).to_string()
            }
            TypeData::StringLiteral { value } => {
                format!("\"{}\"", self.db.strings.resolve(value))
            }
            TypeData::Function { params, ret } => {
                let params = self.db.types.type_list(params);
                let rendered: Vec<String> = params
                    .iter()
                    .map(|&p| self.render_at(p, depth + 1))
                    .collect();
                format!(
                    "({}) -> {}",
                    rendered.join(", "),
                    self.render_at(ret, depth + 1)
                )
            }
            TypeData::Constrained { base, constraints } => {
                let list = self.db.types.constraint_list(constraints);
                let sources: Vec<String> = list
                    .iter()
                    .filter_map(|&c| self.db.types.constraint(c))
                    .map(|info| self.db.strings.resolve(info.source).to_string())
                    .collect();
                format!("{}({})", self.render_at(base, depth + 1), sources.join(", "))
            }
            TypeData::Union { members } => self.render_union(members, depth),
        }
    }

    fn render_union(&self, members: crate::types::TypeListId, depth: u32) -> String {
        let list = self.db.types.type_list(members);
        let null = self.db.null_type();
        let non_null: Vec<TypeId> = list.iter().copied().filter(|&m| m != null).collect();
        let had_null = non_null.len() != list.len();
        let rendered: Vec<String> = non_null
            .iter()
            .map(|&m| self.render_at(m, depth + 1))
            .collect();
        if had_null {
            if rendered.len() == 1 {
                format!("{}?", rendered[0])
            } else {
                format!("({})?", rendered.join("|"))
            }
        } else {
            rendered.join("|")
        }
    }
}
