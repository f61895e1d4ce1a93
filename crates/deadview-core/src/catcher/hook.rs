//! Render hook: the extension point a template engine calls once per render.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::context::CatcherContext;
use crate::templates::relative_id;

/// Receives one call per template render
pub trait RenderObserver: Send + Sync {
    /// `template` is the path of the template being rendered
    fn on_render(&self, template: &Path);
}

/// Counts renders of templates under the views directory.
///
/// Never fails: errors become the context's last exception.
#[derive(Clone)]
pub struct RenderHook {
    ctx: Arc<CatcherContext>,
    root: PathBuf,
    /// Root-relative views directory with a trailing `/`
    views_prefix: String,
}

impl RenderHook {
    pub fn new(ctx: Arc<CatcherContext>, root: impl Into<PathBuf>, views_dir: &Path) -> Self {
        let root = root.into();
        let views_prefix = relative_id(&root, views_dir)
            .map(|dir| format!("{}/", dir))
            .unwrap_or_default();
        Self {
            ctx,
            root,
            views_prefix,
        }
    }

    /// Template id for `template`, if it lives under the views directory
    pub fn resolve(&self, template: &Path) -> Option<String> {
        relative_id(&self.root, template).filter(|id| id.starts_with(&self.views_prefix))
    }

    /// Record a render, then run the real `render`
    pub fn around<R>(&self, template: &Path, render: impl FnOnce() -> R) -> R {
        self.on_render(template);
        render()
    }
}

impl RenderObserver for RenderHook {
    fn on_render(&self, template: &Path) {
        let Some(id) = self.resolve(template) else {
            return;
        };
        if let Err(e) = self.ctx.record_render(&id) {
            tracing::debug!("Render not counted: {}", e);
            self.ctx.stash_exception(format!("{:#}", anyhow::Error::from(e)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(ctx: &Arc<CatcherContext>) -> RenderHook {
        RenderHook::new(ctx.clone(), "/srv/app", Path::new("app/views"))
    }

    #[test]
    fn test_counts_templates_under_views() {
        let ctx = Arc::new(CatcherContext::new(["app/views/home/index.html"]));
        let hook = hook(&ctx);

        hook.on_render(Path::new("/srv/app/app/views/home/index.html"));
        hook.on_render(Path::new("app/views/home/index.html"));

        assert_eq!(
            ctx.with_registry(|r| r.count("app/views/home/index.html")),
            Some(2)
        );
        assert!(ctx.last_exception().is_none());
    }

    #[test]
    fn test_ignores_templates_outside_views() {
        let ctx = Arc::new(CatcherContext::new(["app/views/a.html"]));
        let hook = hook(&ctx);

        hook.on_render(Path::new("/srv/app/vendor/gems/x/app/views/a.html"));
        hook.on_render(Path::new("/elsewhere/app/views/a.html"));
        hook.on_render(Path::new("app/viewsx/a.html"));

        assert_eq!(ctx.with_registry(|r| r.total_renders()), 0);
        assert!(ctx.last_exception().is_none());
    }

    #[test]
    fn test_unknown_template_is_stashed_and_render_proceeds() {
        let ctx = Arc::new(CatcherContext::new(["app/views/a.html"]));
        let hook = hook(&ctx);

        let html = hook.around(Path::new("app/views/missing.html"), || "<p>ok</p>");

        assert_eq!(html, "<p>ok</p>");
        assert_eq!(ctx.with_registry(|r| r.total_renders()), 0);
        let stashed = ctx.last_exception().unwrap();
        assert!(stashed.contains("app/views/missing.html"));
    }

    #[test]
    fn test_later_error_overwrites_earlier() {
        let ctx = Arc::new(CatcherContext::new(["app/views/a.html"]));
        let hook = hook(&ctx);

        hook.on_render(Path::new("app/views/one.html"));
        hook.on_render(Path::new("app/views/two.html"));

        let stashed = ctx.last_exception().unwrap();
        assert!(stashed.contains("two.html"));
        assert!(!stashed.contains("one.html"));
    }
}
