//! The rewrite passes, one per directive family, in pipeline order

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::matcher::{closed_matcher, open_matcher};

/// A named text-to-text rewrite
#[derive(Clone, Copy)]
pub struct Pass {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

impl fmt::Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass").field("name", &self.name).finish()
    }
}

/// Every pass, in the order it must run
///
/// `extends` comes first so the parent include lands at the very end of the
/// template. Comments and echoes come before the control structures, whose
/// patterns are loose enough to match inside unconverted `{{ }}` text.
pub static PIPELINE: [Pass; 16] = [
    Pass { name: "extends", apply: compile_extends },
    Pass { name: "comments", apply: compile_comments },
    Pass { name: "echos", apply: compile_echos },
    Pass { name: "openings", apply: compile_openings },
    Pass { name: "closings", apply: compile_closings },
    Pass { name: "else", apply: compile_else },
    Pass { name: "unless", apply: compile_unless },
    Pass { name: "endunless", apply: compile_end_unless },
    Pass { name: "error", apply: compile_error },
    Pass { name: "enderror", apply: compile_end_error },
    Pass { name: "includes", apply: compile_includes },
    Pass { name: "each", apply: compile_each },
    Pass { name: "yields", apply: compile_yields },
    Pass { name: "shows", apply: compile_shows },
    Pass { name: "section_start", apply: compile_section_start },
    Pass { name: "section_stop", apply: compile_section_stop },
];

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("directive pattern is valid")
}

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| pattern(r"\r?\n"));
static EXTENDS: LazyLock<Regex> = LazyLock::new(|| closed_matcher("extends"));
static COMMENT: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)\{\{--.*?--\}\}"));
static ESCAPED_ECHO: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\{\{\{\s*(.+?)\s*\}\}\}"));
static ECHO: LazyLock<Regex> = LazyLock::new(|| pattern(r"\{\{\s*(.+?)\s*\}\}"));
static OPENING: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(\s*)@(if|elseif|foreach|for|while)(\s*\(.*\))"));
static CLOSING: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(\s*)@(endif|endforeach|endfor|endwhile)(\s*)"));
static ELSE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\s*)@(else)(\s*)"));
static UNLESS: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\s*)@unless\s*\((.*)\)"));
static ERROR: LazyLock<Regex> = LazyLock::new(|| closed_matcher("error"));
static INCLUDE: LazyLock<Regex> = LazyLock::new(|| open_matcher("include"));
static EACH: LazyLock<Regex> = LazyLock::new(|| closed_matcher("each"));
static YIELD: LazyLock<Regex> = LazyLock::new(|| closed_matcher("yield"));
static SECTION: LazyLock<Regex> = LazyLock::new(|| closed_matcher("section"));

/// Move a leading `@extends(...)` to a trailing `@include(...)`
///
/// The child's sections are then registered before the parent layout runs
/// and yields them.
pub(crate) fn compile_extends(value: &str) -> String {
    if !value.starts_with("@extends") {
        return value.to_string();
    }

    let lines: Vec<&str> = LINE_BREAK.split(value).collect();
    let parent = EXTENDS.replace(lines[0], "${1}@include${2}").into_owned();

    let mut body: Vec<&str> = lines[1..].to_vec();
    body.push(&parent);
    body.join("\n")
}

/// Template comments become empty script comments; their text is dropped
pub(crate) fn compile_comments(value: &str) -> String {
    COMMENT.replace_all(value, "<%/**/%>").into_owned()
}

pub(crate) fn compile_echos(value: &str) -> String {
    let escaped = ESCAPED_ECHO.replace_all(value, |caps: &Captures| {
        format!("<% echo e({}); %>", &caps[1])
    });
    ECHO.replace_all(&escaped, |caps: &Captures| format!("<% echo {}; %>", &caps[1]))
        .into_owned()
}

pub(crate) fn compile_openings(value: &str) -> String {
    OPENING
        .replace_all(value, |caps: &Captures| {
            format!("{}<% {}{}: %>", &caps[1], &caps[2], &caps[3])
        })
        .into_owned()
}

pub(crate) fn compile_closings(value: &str) -> String {
    CLOSING
        .replace_all(value, |caps: &Captures| {
            format!("{}<% {}; %>{}", &caps[1], &caps[2], &caps[3])
        })
        .into_owned()
}

pub(crate) fn compile_else(value: &str) -> String {
    ELSE.replace_all(value, |caps: &Captures| {
        format!("{}<% else: %>{}", &caps[1], &caps[3])
    })
    .into_owned()
}

pub(crate) fn compile_unless(value: &str) -> String {
    UNLESS
        .replace_all(value, |caps: &Captures| {
            format!("{}<% if (!({})): %>", &caps[1], &caps[2])
        })
        .into_owned()
}

pub(crate) fn compile_end_unless(value: &str) -> String {
    value.replace("@endunless", "<% endif; %>")
}

/// `@error(bag, field)` or `@error(field)` binds `$message` to the first
/// message for the field, keeping any outer `$message` aside
pub(crate) fn compile_error(value: &str) -> String {
    ERROR
        .replace_all(value, |caps: &Captures| {
            let inner = strip_parentheses(&caps[2]);
            let args: Vec<&str> = inner.split(',').map(str::trim).collect();
            let (bag, field) = match args.as_slice() {
                [field] => ("'default'", *field),
                [bag, field, ..] => (*bag, *field),
                [] => ("'default'", "''"),
            };
            format!(
                "{}<% if ($errors->getBag({bag})->has({field})): \
                 if (isset($message)): $__messageOriginal = $message; endif; \
                 $message = $errors->getBag({bag})->first({field}); %>",
                &caps[1],
            )
        })
        .into_owned()
}

pub(crate) fn compile_end_error(value: &str) -> String {
    value.replace(
        "@enderror",
        "<% unset($message); \
         if (isset($__messageOriginal)): $message = $__messageOriginal; unset($__messageOriginal); endif; \
         endif; %>",
    )
}

/// `@include(view[, data])` renders the view with the current data merged in
pub(crate) fn compile_includes(value: &str) -> String {
    INCLUDE
        .replace_all(value, |caps: &Captures| {
            format!(
                "{}<% echo $__env->make{}, $__data)->render(); %>",
                &caps[1], &caps[2]
            )
        })
        .into_owned()
}

pub(crate) fn compile_each(value: &str) -> String {
    EACH.replace_all(value, |caps: &Captures| {
        format!("{}<% echo $__env->renderEach{}; %>", &caps[1], &caps[2])
    })
    .into_owned()
}

pub(crate) fn compile_yields(value: &str) -> String {
    YIELD
        .replace_all(value, |caps: &Captures| {
            format!("{}<% echo $__env->yieldContent{}; %>", &caps[1], &caps[2])
        })
        .into_owned()
}

pub(crate) fn compile_shows(value: &str) -> String {
    value.replace("@show", "<% echo $__env->yieldSection(); %>")
}

pub(crate) fn compile_section_start(value: &str) -> String {
    SECTION
        .replace_all(value, |caps: &Captures| {
            format!("{}<% $__env->startSection{}; %>", &caps[1], &caps[2])
        })
        .into_owned()
}

pub(crate) fn compile_section_stop(value: &str) -> String {
    value
        .replace("@append", "<% $__env->appendSection(); %>")
        .replace("@endsection", "<% $__env->stopSection(); %>")
        .replace("@stop", "<% $__env->stopSection(); %>")
}

fn strip_parentheses(args: &str) -> &str {
    let trimmed = args.trim();
    trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed)
}
