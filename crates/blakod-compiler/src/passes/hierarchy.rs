//! Class Hierarchy Resolver - compute class layouts, superclasses first.
//!
//! Classes compiled in this session are placed in a [`ClassGraph`] and laid
//! out in topological order, so every layout starts from its superclass's
//! finished layout. A superclass that is only known from the kodbase
//! contributes its stored layout.
//!
//! ```text
//! Object (kodbase)          piFlags=1
//!   └── Monster (source)    piFlags=1 piHits=2
//!         └── Troll (source)  ... piRegen=3
//! ```

use blakod_core::{CompilationError, IdKind};
use blakod_registry::ClassGraph;
use log::debug;
use rustc_hash::FxHashMap;

use crate::layout::{ClassLayout, PropertySlot};
use crate::session::CompilationSession;

type Result<T> = std::result::Result<T, CompilationError>;

/// Computes a [`ClassLayout`] for every class in the session.
pub struct HierarchyResolver<'a> {
    session: &'a mut CompilationSession,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(session: &'a mut CompilationSession) -> Self {
        Self { session }
    }

    /// Order the classes and lay each one out.
    ///
    /// A cycle in the superclass chain is fatal. Member conflicts are
    /// reported and the offending member is skipped.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(self) -> Result<()> {
        let session = self.session;
        let mut graph = ClassGraph::new();
        let mut by_id: FxHashMap<u32, usize> = FxHashMap::default();
        for (index, class) in session.classes.iter().enumerate() {
            let id = session.symbols.get(class.id).id;
            graph.add_class(id);
            by_id.insert(id, index);
        }
        for class in &session.classes {
            let Some(superclass) = class.superclass else {
                continue;
            };
            let parent = session.symbols.get(superclass);
            if parent.kind == IdKind::Class {
                graph.set_superclass(session.symbols.get(class.id).id, parent.id);
            }
        }

        let order = match graph.topological_order() {
            Ok(order) => order,
            Err(member) => {
                let (class, line) = match by_id.get(&member) {
                    Some(&index) => (session.classes[index].name.clone(), session.classes[index].line),
                    None => (member.to_string(), 0),
                };
                return session.fail(CompilationError::CircularInheritance { class, line });
            }
        };

        for id in order {
            let Some(&index) = by_id.get(&id) else {
                continue;
            };
            let layout = lay_out(session, index, id, &by_id)?;
            session.classes[index].layout = Some(layout);
        }
        debug!("laid out {} classes", by_id.len());
        Ok(())
    }
}

fn lay_out(
    session: &mut CompilationSession,
    index: usize,
    id: u32,
    by_id: &FxHashMap<u32, usize>,
) -> Result<ClassLayout> {
    let class = &session.classes[index];
    let mut layout = match class.superclass.map(|s| session.symbols.get(s)) {
        Some(parent) if parent.kind == IdKind::Class => {
            let inherited = by_id
                .get(&parent.id)
                .and_then(|&i| session.classes[i].layout.as_ref());
            match inherited {
                Some(base) => ClassLayout::derive(base, id),
                None => match session.database.class(parent.id) {
                    Some(stored) => ClassLayout::derive(&stored.layout(), id),
                    None => ClassLayout::root(id),
                },
            }
        }
        // Unresolved superclasses were reported when linked.
        _ => ClassLayout::root(id),
    };

    let class_name = class.name.clone();
    let classvars: Vec<(String, u32)> = class.classvars.iter().map(|d| (d.name.clone(), d.line)).collect();
    let properties: Vec<(String, u32)> = class.properties.iter().map(|d| (d.name.clone(), d.line)).collect();

    for (name, line) in classvars {
        if let Err(detail) = layout.declare_classvar(&name) {
            session.report(CompilationError::AmbiguousOverride {
                name,
                class: class_name.clone(),
                detail,
                line,
            });
            session.check_aborted()?;
        }
    }
    for (name, line) in properties {
        if let PropertySlot::Override { classvar, property } = layout.declare_property(&name) {
            if session.options.warn_overrides {
                session.warn(
                    line,
                    format!(
                        "property '{name}' of class '{class_name}' overrides classvar {classvar} as property {property}"
                    ),
                );
            }
        }
    }
    debug!(
        "{class_name}: {} properties ({} new), {} classvars ({} new)",
        layout.num_properties,
        layout.own_new_properties,
        layout.num_classvars,
        layout.own_new_classvars
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use blakod_core::Literal;

    use super::*;
    use crate::ast::Expr;
    use crate::database::Kodbase;
    use crate::layout::Member;

    fn number(n: i32) -> Expr {
        Expr::constant(Literal::Number(n), 1)
    }

    fn layout_of<'s>(session: &'s CompilationSession, name: &str) -> &'s ClassLayout {
        session
            .class_by_name(name)
            .and_then(|c| c.layout.as_ref())
            .unwrap()
    }

    #[test]
    fn subclass_declared_first_still_inherits() {
        let mut session = CompilationSession::default();
        session.begin_class("Troll", Some("Monster"), 1).unwrap();
        session.add_property("piRegen", number(1), 2).unwrap();
        session.finish_class(3).unwrap();
        session.begin_class("Monster", None, 4).unwrap();
        session.add_property("piHits", number(10), 5).unwrap();
        session.finish_class(6).unwrap();

        session.resolve_forward_references().unwrap();
        session.resolve_hierarchy().unwrap();

        let monster = layout_of(&session, "Monster");
        let troll = layout_of(&session, "Troll");
        assert_eq!(troll.member("piHits"), Some(Member::Property(1)));
        assert_eq!(troll.member("piRegen"), Some(Member::Property(2)));
        assert_eq!(troll.num_properties, monster.num_properties + troll.own_new_properties);
    }

    #[test]
    fn cycle_is_fatal() {
        let mut session = CompilationSession::default();
        session.begin_class("A", Some("B"), 1).unwrap();
        session.finish_class(2).unwrap();
        session.begin_class("B", Some("A"), 3).unwrap();
        session.finish_class(4).unwrap();
        session.resolve_forward_references().unwrap();
        assert!(matches!(
            session.resolve_hierarchy(),
            Err(CompilationError::CircularInheritance { .. })
        ));
    }

    #[test]
    fn classvar_over_inherited_property_is_ambiguous() {
        let mut session = CompilationSession::default();
        session.begin_class("Foo", None, 1).unwrap();
        session.add_property("piX", number(0), 2).unwrap();
        session.finish_class(3).unwrap();
        session.begin_class("Bar", Some("Foo"), 4).unwrap();
        session.add_classvar("piX", number(1), 5).unwrap();
        session.finish_class(6).unwrap();

        session.resolve_hierarchy().unwrap();
        assert_eq!(session.diagnostics().error_count(), 1);
        assert_eq!(layout_of(&session, "Bar").member("piX"), Some(Member::Property(1)));
    }

    #[test]
    fn kodbase_superclass_layout_is_used() {
        let mut session = CompilationSession::default();
        let kodbase = Kodbase::parse("C Object 10000 0\nP piFlags 1\nV viKind 0\n").unwrap();
        session.load_kodbase(&kodbase).unwrap();
        session.begin_class("Thing", Some("Object"), 1).unwrap();
        session.add_property("piWeight", number(3), 2).unwrap();
        session.add_classvar("viKind", number(7), 3).unwrap();
        session.finish_class(4).unwrap();
        session.resolve_hierarchy().unwrap();

        let thing = layout_of(&session, "Thing");
        assert_eq!(thing.superclass_id, 10000);
        assert_eq!(thing.member("piWeight"), Some(Member::Property(2)));
        assert_eq!(thing.member("viKind"), Some(Member::ClassVar(0)));
        assert_eq!(thing.own_new_classvars, 0);
    }

    #[test]
    fn override_warning_is_optional() {
        let build = |warn: bool| {
            let options = crate::CompileOptions::default().with_warn_overrides(warn);
            let mut session = CompilationSession::new(options);
            session.begin_class("Foo", None, 1).unwrap();
            session.add_classvar("V", number(1), 2).unwrap();
            session.finish_class(3).unwrap();
            session.begin_class("Bar", Some("Foo"), 4).unwrap();
            session.add_property("V", number(2), 5).unwrap();
            session.finish_class(6).unwrap();
            session.resolve_hierarchy().unwrap();
            session.diagnostics().warning_count()
        };
        assert_eq!(build(false), 0);
        assert_eq!(build(true), 1);
    }
}
