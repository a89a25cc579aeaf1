//! Declaring Viewmodels on Templates
//!
//! [`declare`] attaches a [`Definition`] to a template. Nothing happens at
//! declaration time beyond registering hooks; every view rendered from the
//! template later gets its viewmodel from them.
//!
//! # What Gets Registered
//!
//! - a `created` hook that creates the view's viewmodel (or reuses the one a
//!   previous declaration made), merges the definition's properties into it
//!   and starts its autoruns
//! - the definition's `created`, `rendered` and `destroyed` callbacks, which
//!   receive the viewmodel
//! - the definition's event handlers, which also receive the viewmodel
//! - the bind helper, unless bindings are global

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::template::{bind_helper, Template, View};
use crate::viewmodel::{Definition, ViewModel, ViewModelHook};

/// Declare a viewmodel on `template`.
///
/// A template may be declared more than once; later definitions are merged
/// into the same viewmodel and the first name given sticks.
pub fn declare(
    template: &mut Template,
    name: Option<&str>,
    definition: Definition,
    config: &EngineConfig,
) -> Result<()> {
    definition.validate()?;
    let definition = Arc::new(definition);
    let name = name.map(str::to_string);

    let setup = Arc::clone(&definition);
    template.on_created(move |view| {
        let viewmodel = attach(view, name.as_deref());
        viewmodel.add_props(&setup)?;
        for run in setup.autoruns() {
            let run = Arc::clone(run);
            viewmodel.autorun(move |vm| run(vm));
        }
        Ok(())
    });

    if !definition.created().is_empty() {
        let hooks = definition.created().to_vec();
        template.on_created(move |view| {
            call_hooks(view, &hooks);
            Ok(())
        });
    }
    if !definition.rendered().is_empty() {
        let hooks = definition.rendered().to_vec();
        template.on_rendered(move |view| {
            call_hooks(view, &hooks);
            Ok(())
        });
    }
    if !definition.destroyed().is_empty() {
        let hooks = definition.destroyed().to_vec();
        template.on_destroyed(move |view| {
            call_hooks(view, &hooks);
            Ok(())
        });
    }

    for (key, handler) in definition.events() {
        let handler = Arc::clone(handler);
        template.event(key.clone(), move |event, view| match view.viewmodel() {
            Some(viewmodel) => handler(event, &viewmodel),
            None => tracing::debug!(path = %view.path(), "event on a view without a viewmodel"),
        });
    }

    if !config.global {
        template.helper(config.helper_name.clone(), bind_helper());
    }

    tracing::debug!(
        template = %template.name(),
        props = definition.props().len(),
        computeds = definition.computeds().len(),
        "viewmodel declared"
    );
    Ok(())
}

/// The view's live viewmodel, or a new one called `name`.
fn attach(view: &View, name: Option<&str>) -> ViewModel {
    if let Some(existing) = view.viewmodel().filter(|vm| !vm.is_disposed()) {
        return existing;
    }
    let viewmodel = ViewModel::for_view(view, name);
    view.set_viewmodel(viewmodel.clone());
    viewmodel
}

fn call_hooks(view: &View, hooks: &[ViewModelHook]) {
    if let Some(viewmodel) = view.viewmodel() {
        for hook in hooks {
            hook(&viewmodel);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingRegistry;
    use crate::error::BindError;
    use crate::template::Renderer;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn renderer(config: EngineConfig) -> Renderer {
        Renderer::with_registry(config, Arc::new(BindingRegistry::with_builtins()))
    }

    #[test]
    fn created_hook_builds_the_viewmodel() {
        let config = EngineConfig::default();
        let mut body = Template::new("body");
        declare(&mut body, Some("page"), Definition::new().prop("p", json!(1)), &config).unwrap();
        assert!(body.has_helper("bind"));

        let view = renderer(config).mount(body).unwrap();
        let viewmodel = view.viewmodel().unwrap();
        assert_eq!(viewmodel.name(), Some("page"));
        assert_eq!(viewmodel.get("p").unwrap(), json!(1));
    }

    #[test]
    fn repeated_declarations_merge() {
        let config = EngineConfig::default();
        let mut body = Template::new("body");
        declare(&mut body, None, Definition::new().prop("p", json!(1)), &config).unwrap();
        declare(
            &mut body,
            Some("ignored"),
            Definition::new().prop("p", json!(9)).prop("q", json!(2)),
            &config,
        )
        .unwrap();

        let view = renderer(config).mount(body).unwrap();
        let viewmodel = view.viewmodel().unwrap();
        assert_eq!(viewmodel.name(), None);
        assert_eq!(viewmodel.get("p").unwrap(), json!(1));
        assert_eq!(viewmodel.get("q").unwrap(), json!(2));
    }

    #[test]
    fn callbacks_receive_the_viewmodel() {
        let config = EngineConfig::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (created, rendered) = (seen.clone(), seen.clone());

        let mut body = Template::new("body");
        declare(
            &mut body,
            None,
            Definition::new()
                .prop("p", json!("x"))
                .on_created(move |vm| created.lock().push(("created", vm.get("p").unwrap())))
                .on_rendered(move |vm| rendered.lock().push(("rendered", vm.get("p").unwrap()))),
            &config,
        )
        .unwrap();

        renderer(config).mount(body).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![("created", json!("x")), ("rendered", json!("x"))]
        );
    }

    #[test]
    fn autoruns_start_with_the_view() {
        let config = EngineConfig::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let mut body = Template::new("body");
        declare(
            &mut body,
            None,
            Definition::new().prop("p", json!(0)).autorun(move |vm| {
                vm.get("p").ok();
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            &config,
        )
        .unwrap();

        let renderer = renderer(config);
        let view = renderer.mount(body).unwrap();
        view.viewmodel().unwrap().set("p", json!(1)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        renderer.destroy(&view);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn events_receive_the_viewmodel() {
        let config = EngineConfig::default();
        let mut body = Template::new("body");
        declare(
            &mut body,
            None,
            Definition::new()
                .prop("clicks", json!(0))
                .event("click button", |_, vm| {
                    let clicks = vm.get("clicks").ok().and_then(|v| v.as_u64()).unwrap_or(0);
                    vm.set("clicks", json!(clicks + 1)).ok();
                }),
            &config,
        )
        .unwrap();
        body.render(|scope| {
            scope.element("button");
            Ok(())
        });

        let view = renderer(config).mount(body).unwrap();
        view.roots()[0].fire("click");
        view.roots()[0].fire("click");
        assert_eq!(view.viewmodel().unwrap().get("clicks").unwrap(), json!(2));
    }

    #[test]
    fn global_mode_registers_no_helper() {
        let config = EngineConfig::default().with_global(true);
        let mut body = Template::new("body");
        declare(&mut body, None, Definition::new(), &config).unwrap();
        assert!(!body.has_helper("bind"));
    }

    #[test]
    fn reserved_names_fail_at_declaration() {
        let mut body = Template::new("body");
        let err = declare(
            &mut body,
            None,
            Definition::new().prop("destroyed", json!(1)),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, BindError::ReservedName("destroyed".into()));
    }
}
