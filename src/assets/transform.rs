//! Script content rewriting.
//!
//! The browser client loads Lua through `require`, so `dofile` calls and
//! Windows-style module paths in shipped scripts are rewritten before delivery.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Why a transform could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("script is not UTF-8 text")]
    NotText(#[from] std::str::Utf8Error),
}

/// A rewrite applied to script assets before they are served.
pub trait ScriptTransform: Send + Sync {
    /// Rewrite `content`. Errors make the caller serve the original bytes.
    fn transform(&self, content: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Leaves content untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl ScriptTransform for Passthrough {
    fn transform(&self, content: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(content.to_vec())
    }
}

static DOFILE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"dofile\s*\(\s*["']([^"']*)["']\s*\)|dofile\s+["']([^"']*)["']"#).ok()
});

static REQUIRE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"require\s*\(\s*["']([^"']*)["']\s*\)|require\s+["']([^"']*)["']"#).ok()
});

/// Rewrites `dofile("x")` into `require("x")` and `require("AI\\x")` into `require("AI/x")`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaRequireRewrite;

impl LuaRequireRewrite {
    /// Rewrite Lua source text.
    pub fn rewrite(source: &str) -> String {
        let (Some(dofile), Some(require)) = (DOFILE.as_ref(), REQUIRE.as_ref()) else {
            return source.to_string();
        };
        let source = dofile.replace_all(source, |caps: &Captures| match module_name(caps) {
            Some(name) => format!("require(\"{name}\")"),
            None => caps[0].to_string(),
        });
        let rewritten = require.replace_all(&source, |caps: &Captures| match module_name(caps) {
            Some(name) => format!("require(\"{}\")", name.replace('\\', "/")),
            None => caps[0].to_string(),
        });
        rewritten.into_owned()
    }
}

fn module_name<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
}

impl ScriptTransform for LuaRequireRewrite {
    fn transform(&self, content: &[u8]) -> Result<Vec<u8>, TransformError> {
        let source = std::str::from_utf8(content)?;
        Ok(Self::rewrite(source).into_bytes())
    }
}
