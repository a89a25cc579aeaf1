//! Viewmodel Hierarchy
//!
//! Viewmodels are not linked to each other directly. Their parent and child
//! relations are read off the view tree every time they are asked for, so a
//! view that is re-rendered or destroyed never leaves a stale link behind.
//!
//! # How Lookup Works
//!
//! 1. Start at the view and walk outward through its ancestors.
//! 2. The first view carrying a viewmodel (or one with the requested name)
//!    wins.
//! 3. If nothing is found and the starting view binds in global mode, the
//!    process-wide global viewmodel is used instead.

use crate::error::{BindError, Result};
use crate::template::View;

use super::{ViewModel, GLOBAL_NAME};

/// Split `[qualifier.]property` at the last dot.
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((qualifier, property)) => (Some(qualifier), property),
        None => (None, path),
    }
}

/// Stateless queries over the view tree.
pub struct Hierarchy;

impl Hierarchy {
    /// The nearest viewmodel on `view` or one of its ancestors.
    pub fn for_view(view: &View) -> Option<ViewModel> {
        view.lineage().iter().find_map(View::viewmodel)
    }

    /// The nearest viewmodel, or the nearest one called `name`.
    pub fn lookup(view: &View, name: Option<&str>) -> Result<ViewModel> {
        let found = match name {
            Some(name) => view
                .lineage()
                .iter()
                .filter_map(View::viewmodel)
                .find(|viewmodel| viewmodel.name() == Some(name)),
            None => Self::for_view(view),
        };
        if let Some(viewmodel) = found {
            return Ok(viewmodel);
        }

        match name {
            Some(GLOBAL_NAME) => Ok(ViewModel::global()),
            _ if view.uses_global() && name.is_none() => Ok(ViewModel::global()),
            Some(name) => Err(BindError::ViewModelNotFound {
                name: name.to_string(),
                template: view.name().to_string(),
            }),
            None => Err(BindError::NoViewModel {
                template: view.name().to_string(),
            }),
        }
    }

    /// Find the viewmodel that owns the property at `path`.
    ///
    /// Without a qualifier the search starts at the nearest viewmodel and
    /// moves outward to the first one defining the property. With a
    /// qualifier only the named viewmodel is consulted.
    pub fn resolve_property(view: &View, path: &str) -> Result<(ViewModel, String)> {
        let (qualifier, property) = split_path(path);

        if qualifier.is_some() {
            let viewmodel = Self::lookup(view, qualifier)?;
            if viewmodel.has(property) {
                return Ok((viewmodel, property.to_string()));
            }
            return Err(BindError::PropertyNotFound(path.to_string()));
        }

        let nearest = Self::lookup(view, None)?;
        let mut cursor = Some(nearest);
        while let Some(viewmodel) = cursor {
            if viewmodel.has(property) {
                return Ok((viewmodel, property.to_string()));
            }
            cursor = Self::parent_of(&viewmodel);
        }
        Err(BindError::PropertyNotFound(path.to_string()))
    }

    /// The nearest viewmodel above `viewmodel`'s view. In global mode the
    /// global viewmodel sits above the outermost one.
    pub fn parent_of(viewmodel: &ViewModel) -> Option<ViewModel> {
        let view = viewmodel.view()?;
        let above = view.parent().and_then(|parent| Self::for_view(&parent));
        match above {
            Some(parent) => Some(parent),
            None if view.uses_global() => Some(ViewModel::global()),
            None => None,
        }
    }

    /// The nearest viewmodels below `viewmodel`'s view. Views without a
    /// viewmodel are looked through.
    pub fn children_of(viewmodel: &ViewModel) -> Vec<ViewModel> {
        let Some(view) = viewmodel.view() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut stack: Vec<View> = view.children().into_iter().rev().collect();
        while let Some(child) = stack.pop() {
            match child.viewmodel() {
                Some(found) => out.push(found),
                None => stack.extend(child.children().into_iter().rev()),
            }
        }
        out
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use crate::viewmodel::Definition;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    fn view(name: &str, parent: Option<&View>, global: bool) -> View {
        View::new(Arc::new(Template::new(name)), parent, global, IndexMap::new())
    }

    fn attach(view: &View, name: Option<&str>, definition: Definition) -> ViewModel {
        let viewmodel = ViewModel::for_view(view, name);
        viewmodel.add_props(&definition).unwrap();
        view.set_viewmodel(viewmodel.clone());
        viewmodel
    }

    #[test]
    fn split_path_uses_last_dot() {
        assert_eq!(split_path("name"), (None, "name"));
        assert_eq!(split_path("form.name"), (Some("form"), "name"));
        assert_eq!(split_path("a.b.c"), (Some("a.b"), "c"));
    }

    #[test]
    fn unqualified_lookup_walks_outward() {
        let body = view("body", None, false);
        let outer = attach(&body, Some("outer"), Definition::new().prop("name", json!("x")));
        let inner_view = view("row", Some(&body), false);
        attach(&inner_view, None, Definition::new().prop("other", json!(1)));

        let (owner, property) = Hierarchy::resolve_property(&inner_view, "name").unwrap();
        assert_eq!(owner.id(), outer.id());
        assert_eq!(property, "name");
    }

    #[test]
    fn child_shadows_ancestor() {
        let body = view("body", None, false);
        attach(&body, None, Definition::new().prop("name", json!("outer")));
        let row = view("row", Some(&body), false);
        let inner = attach(&row, None, Definition::new().prop("name", json!("inner")));

        let (owner, _) = Hierarchy::resolve_property(&row, "name").unwrap();
        assert_eq!(owner.id(), inner.id());
        assert_eq!(inner.get("name").unwrap(), json!("inner"));
    }

    #[test]
    fn qualified_lookup_consults_only_the_named_viewmodel() {
        let body = view("body", None, false);
        attach(&body, Some("page"), Definition::new().prop("title", json!("t")));
        let row = view("row", Some(&body), false);
        attach(&row, None, Definition::new().prop("name", json!("n")));

        assert!(Hierarchy::resolve_property(&row, "page.title").is_ok());
        assert_eq!(
            Hierarchy::resolve_property(&row, "page.name").unwrap_err(),
            BindError::PropertyNotFound("page.name".into())
        );
        assert_eq!(
            Hierarchy::resolve_property(&row, "nav.title").unwrap_err(),
            BindError::ViewModelNotFound {
                name: "nav".into(),
                template: "row".into()
            }
        );
    }

    #[test]
    fn missing_viewmodel_is_named_error() {
        let body = view("body", None, false);
        assert_eq!(
            Hierarchy::lookup(&body, None).unwrap_err(),
            BindError::NoViewModel {
                template: "body".into()
            }
        );
    }

    #[test]
    fn global_mode_falls_back_to_global_viewmodel() {
        let body = view("body", None, true);
        let found = Hierarchy::lookup(&body, None).unwrap();
        assert!(found.is_global());
    }

    #[test]
    fn children_skip_views_without_viewmodels() {
        let body = view("body", None, false);
        let top = attach(&body, None, Definition::new());
        let wrapper = view("wrapper", Some(&body), false);
        let leaf = view("leaf", Some(&wrapper), false);
        let leaf_vm = attach(&leaf, None, Definition::new());

        let children = Hierarchy::children_of(&top);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id(), leaf_vm.id());
        assert_eq!(Hierarchy::parent_of(&leaf_vm).map(|vm| vm.id()), Some(top.id()));
    }
}
