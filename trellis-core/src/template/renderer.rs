//! Renderer
//!
//! Drives views through their lifecycle against a [`Document`].
//!
//! # How Rendering Works
//!
//! 1. Create the view under its parent. If a restore snapshot is pending,
//!    the view is seeded with the values saved at its position.
//! 2. Run the template's `created` hooks.
//! 3. Run the render function. It creates elements, attaches bind
//!    declarations and renders child templates (which go through these
//!    same steps, so children finish rendering before their parent).
//! 4. Attach the template's event map.
//! 5. Bind every element the view created that carries a declaration.
//! 6. Run the `rendered` hooks.
//!
//! Any error destroys the half-built view and is returned to the caller.
//!
//! # Destruction
//!
//! Children first, then `destroyed` hooks, binding teardown, event-map
//! listeners, the view's elements and finally its viewmodel.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::binding::{BindingManager, BindingRegistry};
use crate::config::EngineConfig;
use crate::dom::{Document, Element};
use crate::error::{BindError, Result};
use crate::lifecycle::RestoreCoordinator;
use crate::reactive::Deferred;

use super::{bind_helper, Template, View};

/// Attribute carrying an element's bind declarations.
pub const BIND_ATTR: &str = "data-bind";

/// Runs after the body template has been (re-)rendered.
pub type StartupHook = Arc<dyn Fn(&Renderer) + Send + Sync>;

/// The headless host.
pub struct Renderer {
    document: Document,
    bindings: BindingManager,
    config: EngineConfig,
    restore: Arc<RestoreCoordinator>,
    root: Mutex<Option<(Arc<Template>, View)>>,
    startup: Mutex<Vec<StartupHook>>,
}

impl Renderer {
    /// A renderer using the process-wide binding registry.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, BindingRegistry::global())
    }

    /// A renderer with its own binding registry.
    pub fn with_registry(config: EngineConfig, registry: Arc<BindingRegistry>) -> Self {
        Self {
            document: Document::new(),
            bindings: BindingManager::new(registry),
            config,
            restore: Arc::new(RestoreCoordinator::new()),
            root: Mutex::new(None),
            startup: Mutex::new(Vec::new()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn bindings(&self) -> &BindingManager {
        &self.bindings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn restore(&self) -> &Arc<RestoreCoordinator> {
        &self.restore
    }

    /// The mounted body view.
    pub fn root(&self) -> Option<View> {
        self.root.lock().as_ref().map(|(_, view)| view.clone())
    }

    /// Register a hook that runs after every mount and reload.
    pub fn on_startup<F>(&self, hook: F)
    where
        F: Fn(&Renderer) + Send + Sync + 'static,
    {
        self.startup.lock().push(Arc::new(hook));
    }

    /// Run throttled and debounced writes whose timers finished on another
    /// runtime thread. Call this from the thread that renders.
    pub fn drain_deferred(&self) -> usize {
        Deferred::drain()
    }

    /// Wait for deferred writes to arrive, then run them. Await this on the
    /// thread that renders, e.g. in a loop alongside the host's event source.
    pub async fn run_deferred(&self) -> usize {
        Deferred::wait().await
    }

    /// Render `body` into the document body. A previously mounted body is
    /// destroyed first.
    ///
    /// Mounting ends the startup phase: the binding registry is sealed and
    /// refuses new types from here on.
    pub fn mount(&self, mut body: Template) -> Result<View> {
        let registry = self.bindings.registry();
        if !registry.is_sealed() {
            registry.seal();
            tracing::debug!(types = registry.len(), "binding registry sealed");
        }

        if self.config.restore {
            self.restore.install(&mut body);
        }
        let template = Arc::new(body);

        let previous = self.root.lock().take();
        if let Some((_, view)) = previous {
            self.destroy(&view);
        }

        let view = self.render(&template, None, &self.document.body())?;
        *self.root.lock() = Some((template, view.clone()));
        tracing::debug!(template = %view.name(), "body mounted");

        self.run_startup();
        Ok(view)
    }

    /// Tear the whole tree down and render the body again, carrying
    /// viewmodel state across when restore is enabled.
    pub fn reload(&self) -> Result<View> {
        let (template, previous) = self.root.lock().take().ok_or(BindError::NotMounted)?;

        if self.config.restore {
            if let Err(err) = self.restore.capture(&previous) {
                tracing::warn!(error = %err, "could not capture state before reload");
            }
        }
        self.destroy(&previous);
        if self.config.restore {
            self.restore.begin();
        }

        let view = self.render(&template, None, &self.document.body())?;
        *self.root.lock() = Some((template, view.clone()));
        tracing::debug!(template = %view.name(), "body reloaded");

        self.run_startup();
        Ok(view)
    }

    /// Render `template` into `container` under `parent`.
    pub fn render(
        &self,
        template: &Arc<Template>,
        parent: Option<&View>,
        container: &Element,
    ) -> Result<View> {
        let global = self.config.global && !template.has_helper(&self.config.helper_name);
        let path = View::path_for(parent, template.name());
        let seed = self.restore.seed_for(&path);
        let view = View::new(Arc::clone(template), parent, global, seed);

        match self.build(&view, container) {
            Ok(()) => {
                tracing::trace!(path = %view.path(), "view rendered");
                Ok(view)
            }
            Err(err) => {
                tracing::debug!(path = %view.path(), error = %err, "render failed");
                self.destroy(&view);
                Err(err)
            }
        }
    }

    fn build(&self, view: &View, container: &Element) -> Result<()> {
        let template = Arc::clone(view.template());

        for hook in template.created_hooks() {
            hook(view)?;
        }

        if let Some(render) = template.render_fn() {
            let mut scope = RenderScope {
                renderer: self,
                view,
                container: container.clone(),
            };
            render(&mut scope)?;
        }

        self.attach_events(view);

        for element in view.elements() {
            if let Some(declaration) = element.attr(BIND_ATTR) {
                self.bindings.bind(view, &element, &declaration)?;
            }
        }

        view.mark_rendered();
        for hook in template.rendered_hooks() {
            hook(view)?;
        }
        Ok(())
    }

    fn attach_events(&self, view: &View) {
        let template = Arc::clone(view.template());
        for (key, handler) in template.event_map() {
            for entry in key.split(',') {
                let entry = entry.trim();
                let (kind, selector) = match entry.split_once(char::is_whitespace) {
                    Some((kind, selector)) => (kind, Some(selector.trim())),
                    None => (entry, None),
                };
                if kind.is_empty() {
                    continue;
                }

                let targets: Vec<Element> = match selector {
                    None => view.roots(),
                    Some(selector) => view
                        .elements()
                        .into_iter()
                        .filter(|element| element.matches(selector))
                        .collect(),
                };

                for target in targets {
                    let weak = view.downgrade();
                    let handler = Arc::clone(handler);
                    let id = target.add_listener(kind, move |event| {
                        if let Some(view) = weak.upgrade() {
                            handler(event, &view);
                        }
                    });
                    view.add_listener(target, id);
                }
            }
        }
    }

    /// Destroy `view` and everything under it. Safe to call twice.
    pub fn destroy(&self, view: &View) {
        if !view.mark_destroyed() {
            return;
        }

        for child in view.children() {
            self.destroy(&child);
        }

        for hook in view.template().destroyed_hooks() {
            if let Err(err) = hook(view) {
                tracing::warn!(path = %view.path(), error = %err, "destroyed hook failed");
            }
        }

        let torn_down = self.bindings.unbind_view(view);
        for (element, id) in view.take_listeners() {
            element.remove_listener(id);
        }
        for element in view.roots() {
            element.remove();
        }
        if let Some(viewmodel) = view.viewmodel() {
            viewmodel.dispose();
        }
        if let Some(parent) = view.parent() {
            parent.remove_child(view);
        }

        tracing::debug!(path = %view.path(), bindings = torn_down, "view destroyed");
    }

    fn run_startup(&self) {
        let hooks = self.startup.lock().clone();
        for hook in hooks {
            hook(self);
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("root", &self.root())
            .finish()
    }
}

/// Handed to a template's render function.
pub struct RenderScope<'a> {
    renderer: &'a Renderer,
    view: &'a View,
    container: Element,
}

impl RenderScope<'_> {
    pub fn view(&self) -> &View {
        self.view
    }

    pub fn document(&self) -> &Document {
        &self.renderer.document
    }

    /// The element this view renders into.
    pub fn container(&self) -> &Element {
        &self.container
    }

    /// Create a top-level element of this view.
    pub fn element(&mut self, tag: &str) -> Element {
        let element = self.renderer.document.create_element(tag);
        self.container.append(&element);
        self.view.add_root(element.clone());
        self.view.add_owned(element.clone());
        element
    }

    /// Create an element nested inside one of this view's elements.
    pub fn element_in(&mut self, parent: &Element, tag: &str) -> Element {
        let element = self.renderer.document.create_element(tag);
        parent.append(&element);
        self.view.add_owned(element.clone());
        element
    }

    /// Attach a bind declaration to `element` through the template's bind
    /// helper. Bindings are wired once the render function returns.
    pub fn bind(&mut self, element: &Element, declaration: &str) -> Result<()> {
        let config = &self.renderer.config;
        let template = self.view.template();
        let helper = match template.get_helper(&config.helper_name) {
            Some(helper) => Arc::clone(helper),
            None if config.global => bind_helper(),
            None => {
                return Err(BindError::MissingHelper {
                    template: template.name().to_string(),
                    helper: config.helper_name.clone(),
                })
            }
        };

        let output = helper(self.view, &[Value::from(declaration)]);
        let Some(declaration) = output.as_str() else {
            return Err(BindError::declaration(declaration, "bind helper returned a non-string"));
        };

        let combined = match element.attr(BIND_ATTR) {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}, {declaration}"),
            _ => declaration.to_string(),
        };
        element.set_attr(BIND_ATTR, combined);
        Ok(())
    }

    /// Render a child template at the end of this view's container.
    pub fn render(&mut self, template: &Arc<Template>) -> Result<View> {
        self.renderer.render(template, Some(self.view), &self.container)
    }

    /// Render a child template inside `parent`.
    pub fn render_in(&mut self, parent: &Element, template: &Arc<Template>) -> Result<View> {
        self.renderer.render(template, Some(self.view), parent)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewmodel::{Definition, ViewModel};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn renderer() -> Renderer {
        Renderer::with_registry(EngineConfig::default(), Arc::new(BindingRegistry::with_builtins()))
    }

    fn with_viewmodel(template: &mut Template, definition: Definition) {
        template.helper("bind", bind_helper());
        template.on_created(move |view| view.viewmodel_or_create().add_props(&definition));
    }

    #[test]
    fn render_wires_declared_bindings() {
        let renderer = renderer();
        let mut body = Template::new("body");
        with_viewmodel(&mut body, Definition::new().prop("done", json!(true)));
        body.render(|scope| {
            let input = scope.element("input");
            scope.bind(&input, "checked: done")
        });

        let view = renderer.mount(body).unwrap();
        let input = &view.roots()[0];
        assert!(input.checked());
        assert_eq!(renderer.bindings().active_count(), 1);
    }

    #[test]
    fn bind_without_helper_fails() {
        let renderer = renderer();
        let mut body = Template::new("body");
        body.render(|scope| {
            let input = scope.element("input");
            scope.bind(&input, "checked: done")
        });

        let err = renderer.mount(body).unwrap_err();
        assert_eq!(
            err,
            BindError::MissingHelper {
                template: "body".into(),
                helper: "bind".into()
            }
        );
        assert!(renderer.document().body().children().is_empty());
    }

    #[test]
    fn repeated_bind_calls_accumulate() {
        let renderer = renderer();
        let mut body = Template::new("body");
        with_viewmodel(&mut body, Definition::new().prop("a", json!(true)).prop("b", json!("x")));
        body.render(|scope| {
            let input = scope.element("input");
            scope.bind(&input, "checked: a")?;
            scope.bind(&input, "value: b")
        });

        let view = renderer.mount(body).unwrap();
        assert_eq!(
            view.roots()[0].attr(BIND_ATTR).as_deref(),
            Some("checked: a, value: b")
        );
        assert_eq!(renderer.bindings().active_count(), 2);
    }

    #[test]
    fn event_map_uses_selectors() {
        let renderer = renderer();
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();

        let mut body = Template::new("body");
        body.event("click button.save", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        body.render(|scope| {
            let form = scope.element("form");
            let save = scope.element_in(&form, "button");
            save.set_attr("class", "save");
            scope.element_in(&form, "button");
            Ok(())
        });

        let view = renderer.mount(body).unwrap();
        let buttons = view.roots()[0].children();
        buttons[0].fire("click");
        buttons[1].fire("click");
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    fn record(
        log: &Arc<Mutex<Vec<&'static str>>>,
        stage: &'static str,
    ) -> impl Fn(&View) -> Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_| {
            log.lock().push(stage);
            Ok(())
        }
    }

    #[test]
    fn hooks_run_in_lifecycle_order() {
        let renderer = renderer();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut child = Template::new("child");
        child
            .on_created(record(&log, "child created"))
            .on_rendered(record(&log, "child rendered"))
            .on_destroyed(record(&log, "child destroyed"));
        let child = Arc::new(child);

        let mut body = Template::new("body");
        body.on_rendered(record(&log, "body rendered"));
        body.render(move |scope| scope.render(&child).map(|_| ()));

        let view = renderer.mount(body).unwrap();
        renderer.destroy(&view);
        renderer.destroy(&view);

        assert_eq!(
            *log.lock(),
            vec!["child created", "child rendered", "body rendered", "child destroyed"]
        );
    }

    #[test]
    fn destroy_disposes_viewmodels_and_elements() {
        let renderer = renderer();
        let mut body = Template::new("body");
        with_viewmodel(&mut body, Definition::new().prop("name", json!("x")));
        body.render(|scope| {
            let input = scope.element("input");
            scope.bind(&input, "value: name")
        });

        let view = renderer.mount(body).unwrap();
        let viewmodel: ViewModel = view.viewmodel().unwrap();
        let input = view.roots()[0].clone();

        renderer.destroy(&view);
        assert!(viewmodel.is_disposed());
        assert!(!input.is_attached());
        assert_eq!(input.listener_count(), 0);
        assert_eq!(renderer.bindings().active_count(), 0);
    }

    #[test]
    fn reload_requires_a_mounted_body() {
        assert_eq!(renderer().reload().unwrap_err(), BindError::NotMounted);
    }

    #[test]
    fn startup_hooks_fire_on_mount_and_reload() {
        let renderer = renderer();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        renderer.on_startup(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        renderer.mount(Template::new("body")).unwrap();
        renderer.reload().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mount_seals_the_registry() {
        let renderer = renderer();
        let registry = Arc::clone(renderer.bindings().registry());
        assert!(!registry.is_sealed());

        renderer.mount(Template::new("body")).unwrap();
        assert!(registry.is_sealed());
        let late = crate::binding::Binding::new().set(|element, value: &Value| {
            element.set_prop("late", value.clone());
        });
        assert_eq!(
            registry.add_binding("late", late).unwrap_err(),
            BindError::RegistrySealed("late".into())
        );
        assert!(!registry.contains("late"));
    }

    #[test]
    fn reload_frees_the_previous_tree() {
        let renderer = renderer();
        let mut body = Template::new("body");
        with_viewmodel(&mut body, Definition::new().prop("name", json!("x")));
        body.render(|scope| {
            let form = scope.element("form");
            let input = scope.element_in(&form, "input");
            scope.bind(&input, "value: name")
        });

        renderer.mount(body).unwrap();
        let nodes = renderer.document().node_count();
        for _ in 0..50 {
            renderer.reload().unwrap();
        }
        assert_eq!(renderer.document().node_count(), nodes);
        assert_eq!(renderer.document().body().children().len(), 1);
        assert_eq!(renderer.bindings().active_count(), 1);
    }
}
