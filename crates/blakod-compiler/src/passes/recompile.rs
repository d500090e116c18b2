//! Recompilation Planner - forward superclass links and dirty classes.
//!
//! Two jobs, run at the start and at the end of a compilation:
//!
//! - [`RecompilationPlanner::link`] checks every class whose superclass was
//!   not yet declared when the class was. The placeholder it recorded has
//!   been promoted in place if the superclass turned up later.
//! - [`RecompilationPlanner::plan`] compares each compiled layout with the
//!   layout recorded in the kodbase. A class whose layout changed, and
//!   every class that inherits from it, must be regenerated, since their
//!   code addresses properties and classvars by slot. The planner sets the
//!   `dirty` flag of every such class; kodbase classes keep it until they
//!   are compiled again.

use blakod_core::{CompilationError, IdKind};
use blakod_registry::ClassGraph;
use log::debug;
use rustc_hash::FxHashSet;

use crate::session::CompilationSession;

type Result<T> = std::result::Result<T, CompilationError>;

/// Classes affected by layout changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecompilePlan {
    /// Compiled classes whose layout differs from the kodbase, by id.
    pub changed: Vec<u32>,
    /// Changed classes, every class inheriting from one, and kodbase
    /// classes still marked dirty from an earlier build, by id.
    pub dirty: Vec<u32>,
    /// Forward superclass links that were resolved, as `(class, superclass)`.
    pub pending_resolved: Vec<(u32, u32)>,
    /// Dirty classes with no source in this session.
    pub stale: Vec<u32>,
}

impl RecompilePlan {
    pub fn is_dirty(&self, class: u32) -> bool {
        self.dirty.binary_search(&class).is_ok()
    }

    /// Whether nothing needs to be regenerated.
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }
}

pub struct RecompilationPlanner<'a> {
    session: &'a mut CompilationSession,
}

impl<'a> RecompilationPlanner<'a> {
    pub fn new(session: &'a mut CompilationSession) -> Self {
        Self { session }
    }

    /// Report forward superclasses that were never defined. Their classes
    /// are compiled as hierarchy roots.
    pub fn link(self) -> Result<()> {
        let session = self.session;
        let pending = session.worklist.clone();
        for entry in pending {
            if session.symbols.get(entry.superclass).kind == IdKind::Class {
                continue;
            }
            let class = session.symbols.get(entry.class).name.clone();
            session.report(CompilationError::UndefinedSuperclass {
                class,
                superclass: entry.name.clone(),
                line: entry.line,
            });
            session.check_aborted()?;
            if let Some(&index) = session.class_index.get(&entry.class) {
                session.classes[index].superclass = None;
            }
        }
        Ok(())
    }

    /// Work out which classes need new code.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn plan(self) -> RecompilePlan {
        let session = self.session;
        let mut plan = RecompilePlan::default();

        for entry in &session.worklist {
            let superclass = session.symbols.get(entry.superclass);
            if superclass.kind == IdKind::Class {
                let class = session.symbols.get(entry.class).id;
                plan.pending_resolved.push((class, superclass.id));
            }
        }

        let mut graph = ClassGraph::new();
        for stored in &session.database.classes {
            graph.set_superclass(stored.id, stored.superclass);
        }
        let mut compiled = FxHashSet::default();
        for class in &session.classes {
            let Some(layout) = &class.layout else {
                continue;
            };
            compiled.insert(layout.class_id);
            graph.set_superclass(layout.class_id, layout.superclass_id);
            if let Some(stored) = session.database.class(layout.class_id) {
                if stored.layout().fingerprint() != layout.fingerprint() {
                    debug!("layout of {} changed", class.name);
                    plan.changed.push(layout.class_id);
                }
            }
        }
        plan.changed.sort_unstable();

        let mut dirty: FxHashSet<u32> = plan.changed.iter().copied().collect();
        for &class in &plan.changed {
            dirty.extend(graph.descendants(class));
        }
        for class in &mut session.classes {
            if class.layout.as_ref().is_some_and(|l| dirty.contains(&l.class_id)) {
                class.dirty = true;
            }
        }
        for stored in &mut session.database.classes {
            if compiled.contains(&stored.id) {
                continue;
            }
            stored.dirty |= dirty.contains(&stored.id);
            if stored.dirty {
                dirty.insert(stored.id);
                plan.stale.push(stored.id);
            }
        }
        plan.dirty = dirty.into_iter().collect();
        plan.dirty.sort_unstable();
        plan.stale.sort_unstable();

        for &id in &plan.stale {
            let name = session
                .database
                .class(id)
                .map_or_else(|| id.to_string(), |c| c.name.clone());
            let message = format!("class '{name}' must be recompiled: a superclass layout changed");
            session.warn(0, message);
        }
        debug!(
            "recompilation: {} changed, {} dirty, {} stale",
            plan.changed.len(),
            plan.dirty.len(),
            plan.stale.len()
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use blakod_core::Literal;

    use super::*;
    use crate::ast::Expr;
    use crate::database::Kodbase;

    const KODBASE: &str = "\
C Monster 10000 0
P piHits 1
C Troll 10001 10000
P piHits 1
P piRegen 2
C Orc 10002 10000
P piHits 1
";

    fn number(n: i32) -> Expr {
        Expr::constant(Literal::Number(n), 1)
    }

    fn session_with(monster_props: &[&str]) -> CompilationSession {
        let mut session = CompilationSession::default();
        session.load_kodbase(&Kodbase::parse(KODBASE).unwrap()).unwrap();
        session.begin_class("Monster", None, 1).unwrap();
        for (line, name) in monster_props.iter().enumerate() {
            session.add_property(name, number(0), line as u32 + 2).unwrap();
        }
        session.finish_class(10).unwrap();
        session.begin_class("Troll", Some("Monster"), 11).unwrap();
        session.add_property("piRegen", number(1), 12).unwrap();
        session.finish_class(13).unwrap();
        session.resolve_forward_references().unwrap();
        session.resolve_hierarchy().unwrap();
        session
    }

    #[test]
    fn unchanged_layouts_are_clean() {
        let mut session = session_with(&["piHits"]);
        let plan = session.plan_recompilation();
        assert!(plan.is_clean());
        assert!(plan.changed.is_empty());
    }

    #[test]
    fn changed_superclass_dirties_subclasses() {
        let mut session = session_with(&["piHits", "piMana"]);
        let plan = session.plan_recompilation();
        assert_eq!(plan.changed, vec![10000, 10001]);
        assert_eq!(plan.dirty, vec![10000, 10001, 10002]);
        assert_eq!(plan.stale, vec![10002]);
        assert!(plan.is_dirty(10002));
        assert_eq!(session.diagnostics().warning_count(), 1);
    }

    #[test]
    fn untouched_kodbase_subclass_flips_to_dirty() {
        let mut session = session_with(&["piHits", "piMana"]);
        let orc = session.database().class(10002).unwrap();
        assert!(!orc.dirty);

        session.plan_recompilation();
        assert!(session.database().class(10002).unwrap().dirty);
        assert!(session.classes().iter().all(|class| class.dirty));
        // Troll was compiled from source, so its kodbase record is replaced.
        assert!(!session.database().class(10001).unwrap().dirty);

        // The mark survives into the next build even when nothing changes.
        let mut next = CompilationSession::default();
        next.load_kodbase(&session.export_kodbase()).unwrap();
        let plan = next.plan_recompilation();
        assert!(plan.changed.is_empty());
        assert_eq!(plan.stale, vec![10002]);
        assert_eq!(plan.dirty, vec![10002]);
    }

    #[test]
    fn undefined_forward_superclass_is_reported() {
        let mut session = CompilationSession::default();
        session.begin_class("Troll", Some("Monster"), 1).unwrap();
        session.finish_class(2).unwrap();
        session.resolve_forward_references().unwrap();
        assert_eq!(session.diagnostics().error_count(), 1);
        assert_eq!(session.classes()[0].superclass, None);
    }

    #[test]
    fn resolved_forward_links_are_listed() {
        let mut session = CompilationSession::default();
        session.begin_class("Troll", Some("Monster"), 1).unwrap();
        session.finish_class(2).unwrap();
        session.begin_class("Monster", None, 3).unwrap();
        session.finish_class(4).unwrap();
        session.resolve_forward_references().unwrap();
        session.resolve_hierarchy().unwrap();
        let troll = session.class_by_name("Troll").unwrap().id;
        let monster = session.class_by_name("Monster").unwrap().id;
        let plan = session.plan_recompilation();
        assert_eq!(
            plan.pending_resolved,
            vec![(session.id_of(troll), session.id_of(monster))]
        );
    }
}
