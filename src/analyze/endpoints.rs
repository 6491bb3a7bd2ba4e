//! HTTP route recovery.
//!
//! Each routing idiom is a matcher in a priority-ordered registry: a cheap
//! predicate deciding whether a line uses the idiom, plus an extractor that
//! turns the line (and, for multi-line statements, the lines after it) into
//! route matches. The first matcher that produces routes for a line wins, so
//! framework-branded idioms shadow the generic fallback, which is always
//! registered last. New idioms are added by appending to [`registry`].
//!
//! Scoping that spans lines (Laravel route groups, Symfony class-level route
//! prefixes) is tracked by [`detect_endpoints`] and applied to the matches
//! after extraction; the matchers themselves stay stateless.

use std::collections::HashMap;

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;

use super::Scrubbed;
use crate::facts::{EndpointRecord, HttpMethod, IdiomFamily, ResponseFormat};
use crate::scan::SourceFile;

/// Middleware names containing one of these imply an authenticated route.
const AUTH_MARKERS: &[&str] = &["auth", "jwt", "token", "sanctum", "guard", "login"];

/// How many following lines a multi-line route statement may span.
const STATEMENT_LOOKAHEAD: usize = 5;

/// How far to look past a Symfony route attribute for its target.
const ATTRIBUTE_LOOKAHEAD: usize = 8;

/// Receivers whose `group` calls open a route scope.
const GROUP_CALLERS: &[&str] = &["Route::", "$router->", "$app->", "$group->"];

/// How many following lines a route group header may span before its closure.
const GROUP_LOOKAHEAD: usize = 12;

lazy_static! {
    static ref LARAVEL_VERB: Regex = Regex::new(
        r#"(?:Route::|\$router->)((?:(?:middleware|withoutMiddleware|prefix|name|domain|namespace|controller|scopeBindings)\s*\([^;()]*\)\s*->\s*)*)(get|post|put|patch|delete|options|any)\s*\(\s*['"]([^'"]*)['"]\s*,?\s*(.*)"#
    )
    .unwrap();
    static ref LARAVEL_MATCH: Regex = Regex::new(
        r#"Route::match\s*\(\s*\[([^\]]*)\]\s*,\s*['"]([^'"]*)['"]\s*,?\s*(.*)"#
    )
    .unwrap();
    static ref LARAVEL_RESOURCE: Regex = Regex::new(
        r#"Route::(resource|apiResource)\s*\(\s*['"]([^'"]+)['"]\s*,\s*\\?([\w\\]+)"#
    )
    .unwrap();
    static ref LARAVEL_MIDDLEWARE: Regex =
        Regex::new(r#"->middleware\s*\(\s*(\[[^\]]*\]|['"][^'"]*['"])"#).unwrap();
    static ref LARAVEL_GROUP: Regex = Regex::new(
        r"(?:Route::|\$router->)(?:group\s*\(|\w+\s*\(.*->group\s*\()"
    )
    .unwrap();
    static ref GROUP_PREFIX: Regex = Regex::new(
        r#"(?:['"]prefix['"]\s*=>\s*|prefix\s*\(\s*)['"]([^'"]*)['"]"#
    )
    .unwrap();
    static ref GROUP_MIDDLEWARE: Regex = Regex::new(
        r#"(?:['"]middleware['"]\s*=>\s*|middleware\s*\(\s*)(\[[^\]]*\]|['"][^'"]*['"])"#
    )
    .unwrap();

    static ref SLIM_VERB: Regex = Regex::new(
        r#"\$(?:app|group)->(get|post|put|patch|delete|options|any)\s*\(\s*['"]([^'"]*)['"]\s*,?\s*(.*)"#
    )
    .unwrap();
    static ref SLIM_MAP: Regex = Regex::new(
        r#"\$(?:app|group)->map\s*\(\s*\[([^\]]*)\]\s*,\s*['"]([^'"]*)['"]\s*,?\s*(.*)"#
    )
    .unwrap();
    static ref SLIM_ADD: Regex = Regex::new(r"->add\s*\(\s*(?:new\s+)?\\?([\w\\]+)").unwrap();
    static ref SLIM_GROUP: Regex =
        Regex::new(r#"\$(?:app|group)->group\s*\(\s*['"]([^'"]*)['"]"#).unwrap();

    static ref CI_ROUTE: Regex = Regex::new(
        r#"\$route\[\s*['"]([^'"]+)['"]\s*\](?:\[\s*['"](\w+)['"]\s*\])?\s*=\s*['"]([^'"]+)['"]"#
    )
    .unwrap();
    static ref CI4_ROUTE: Regex = Regex::new(
        r#"\$routes->(get|post|put|patch|delete|add|options)\s*\(\s*['"]([^'"]*)['"]\s*,\s*(.*)"#
    )
    .unwrap();

    static ref SYMFONY_ATTRIBUTE: Regex = Regex::new(r"#\[Route\s*\((.*)\)\s*\]").unwrap();
    static ref SYMFONY_ANNOTATION: Regex = Regex::new(r"@Route\s*\((.*)\)").unwrap();
    static ref SYMFONY_PATH: Regex = Regex::new(r#"^\s*['"]([^'"]*)['"]"#).unwrap();
    static ref SYMFONY_NAMED_PATH: Regex =
        Regex::new(r#"\bpath\s*[:=]\s*['"]([^'"]*)['"]"#).unwrap();
    static ref SYMFONY_METHODS: Regex =
        Regex::new(r"methods\s*[:=]\s*[\[{]([^\]}]*)[\]}]").unwrap();
    static ref CLASS_DECL: Regex =
        Regex::new(r"^\s*(?:(?:abstract|final|readonly)\s+)*class\s+(\w+)").unwrap();
    static ref FUNCTION_DECL: Regex = Regex::new(r"\bfunction\s+&?(\w+)\s*\(").unwrap();

    static ref REQUEST_METHOD_CHECK: Regex = Regex::new(
        r#"\$_SERVER\[\s*['"]REQUEST_METHOD['"]\s*\]\s*(?:===?|!==?)\s*['"](\w+)['"]|['"](\w+)['"]\s*(?:===?|!==?)\s*\$_SERVER\[\s*['"]REQUEST_METHOD['"]\s*\]"#
    )
    .unwrap();
    static ref REQUEST_METHOD_SWITCH: Regex =
        Regex::new(r#"switch\s*\(\s*\$_SERVER\[\s*['"]REQUEST_METHOD['"]\s*\]"#).unwrap();
    static ref CASE_ARM: Regex = Regex::new(r#"case\s+['"](\w+)['"]\s*:"#).unwrap();

    static ref HANDLER_ARRAY: Regex =
        Regex::new(r#"^\[\s*\\?([\w\\]+)::class\s*,\s*['"](\w+)['"]\s*\]"#).unwrap();
    static ref HANDLER_AT: Regex = Regex::new(r#"^['"]\\?([\w\\]+)@(\w+)['"]"#).unwrap();
    static ref HANDLER_DOUBLE_COLON: Regex =
        Regex::new(r#"^['"]\\?([\w\\]+)::(\w+)"#).unwrap();
    static ref HANDLER_COLON: Regex = Regex::new(r#"^['"]\\?([\w\\]+):(\w+)['"]"#).unwrap();
    static ref HANDLER_CONCAT: Regex =
        Regex::new(r#"^\\?([\w\\]+)::class\s*\.\s*['"]:(\w+)['"]"#).unwrap();
    static ref HANDLER_INVOKABLE: Regex = Regex::new(r"^\\?([\w\\]+)::class").unwrap();
    static ref HANDLER_CLOSURE: Regex = Regex::new(r"^(?:static\s+)?(?:function|fn)\b").unwrap();
    static ref HANDLER_STRING: Regex = Regex::new(r#"^['"]([^'"]+)['"]"#).unwrap();

    static ref QUOTED: Regex = Regex::new(r#"['"]([^'"]+)['"]"#).unwrap();
    static ref BRACE_PARAM: Regex = Regex::new(r"\{(\w+)\??(?::[^}]*)?\}").unwrap();
    static ref SEGMENT_PARAM: Regex = Regex::new(r"\(:(\w+)\)").unwrap();
    static ref COLON_PARAM: Regex = Regex::new(r"(?:^|/):(\w+)").unwrap();

    static ref JSON_RESPONSE: Regex = Regex::new(
        r"json_encode\s*\(|->json\s*\(|JsonResponse|->withJson\s*\(|application/json"
    )
    .unwrap();
    static ref AUTH_GUARD: Regex = Regex::new(
        r#"\$_SESSION\[\s*['"](?:user|user_id|uid|logged_in|auth|authenticated)['"]|Auth::check\s*\(|is_?logged_?in\s*\(|isLoggedIn\s*\(|HTTP_AUTHORIZATION|require_?login\s*\(|check_?auth\s*\("#
    )
    .unwrap();
}

/// A route recovered from one line, before file-level context is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub method: HttpMethod,
    pub pattern: String,
    pub handler: String,
    pub middleware: Vec<String>,
    /// The declaration itself demands authentication.
    pub auth: bool,
}

impl RouteMatch {
    fn new(method: HttpMethod, pattern: &str, handler: String) -> Self {
        Self {
            method,
            pattern: pattern.to_string(),
            handler,
            middleware: Vec::new(),
            auth: false,
        }
    }
}

/// Everything a matcher may look at for one line.
pub struct LineContext<'a> {
    /// Line with comments removed.
    pub text: &'a str,
    /// Line with comments and string contents removed.
    pub code: &'a str,
    /// Original line, comments included (annotation idioms live there).
    pub raw: &'a str,
    /// Comment-free lines after this one.
    pub following: &'a [&'a str],
    /// Original lines after this one.
    pub raw_following: &'a [&'a str],
    pub file_name: &'a str,
    pub file_stem: &'a str,
    pub current_class: Option<&'a str>,
}

impl LineContext<'_> {
    /// The line joined with its continuation lines, up to the closing `;`.
    fn statement(&self) -> String {
        let mut stmt = self.text.trim().to_string();
        for next in self.following.iter().take(STATEMENT_LOOKAHEAD) {
            if stmt.contains(';') || stmt.ends_with('{') {
                break;
            }
            stmt.push(' ');
            stmt.push_str(next.trim());
        }
        stmt
    }
}

/// A routing idiom: predicate plus extractor.
pub trait IdiomMatcher: Send + Sync {
    fn family(&self) -> IdiomFamily;

    /// Whether the line uses this idiom at all.
    fn matches(&self, ctx: &LineContext<'_>) -> bool;

    /// Routes declared by the line; empty when the predicate was a false positive.
    fn extract(&self, ctx: &LineContext<'_>) -> Vec<RouteMatch>;
}

static REGISTRY: Lazy<Vec<Box<dyn IdiomMatcher>>> = Lazy::new(|| {
    vec![
        Box::new(LaravelRoutes),
        Box::new(SlimRoutes),
        Box::new(CodeIgniterRoutes),
        Box::new(SymfonyRoutes),
        Box::new(RequestMethodChecks),
    ]
});

/// The matchers in priority order.
pub fn registry() -> &'static [Box<dyn IdiomMatcher>] {
    &REGISTRY
}

struct LaravelRoutes;

impl IdiomMatcher for LaravelRoutes {
    fn family(&self) -> IdiomFamily {
        IdiomFamily::Laravel
    }

    fn matches(&self, ctx: &LineContext<'_>) -> bool {
        ctx.code.contains("Route::") || ctx.code.contains("$router->")
    }

    fn extract(&self, ctx: &LineContext<'_>) -> Vec<RouteMatch> {
        let stmt = ctx.statement();
        let mut routes = Vec::new();
        let mut trailing = stmt.as_str();

        if let Some(caps) = LARAVEL_VERB.captures(&stmt) {
            // Route::prefix('v1')->middleware('auth')->get(...)
            let chain = &caps[1];
            let pattern = match GROUP_PREFIX.captures(chain) {
                Some(prefix) => join_prefix(&prefix[1], &caps[3]),
                None => caps[3].to_string(),
            };
            let mut route =
                RouteMatch::new(HttpMethod::parse(&caps[2]), &pattern, parse_handler(&caps[4]));
            route.middleware = GROUP_MIDDLEWARE
                .captures_iter(chain)
                .flat_map(|c| quoted_list(&c[1]))
                .collect();
            routes.push(route);
            trailing = caps.get(4).map_or("", |m| m.as_str());
        } else if let Some(caps) = LARAVEL_MATCH.captures(&stmt) {
            let handler = parse_handler(&caps[3]);
            for verb in quoted_list(&caps[1]) {
                routes.push(RouteMatch::new(HttpMethod::parse(&verb), &caps[2], handler.clone()));
            }
        } else if let Some(caps) = LARAVEL_RESOURCE.captures(&stmt) {
            routes = expand_resource(&caps[2], short_name(&caps[3]), &caps[1] == "apiResource");
        }

        let middleware: Vec<String> = LARAVEL_MIDDLEWARE
            .captures_iter(trailing)
            .flat_map(|c| quoted_list(&c[1]))
            .collect();
        for route in &mut routes {
            route.middleware.extend(middleware.iter().cloned());
        }
        routes
    }
}

/// Expand `Route::resource` into its conventional actions.
fn expand_resource(base: &str, controller: &str, api_only: bool) -> Vec<RouteMatch> {
    let base = base.trim_matches('/');
    let last = base.rsplit('/').next().unwrap_or(base);
    let param = singular(last);
    let item = format!("/{}/{{{}}}", base, param);
    let collection = format!("/{}", base);

    let mut actions = vec![
        (HttpMethod::Get, collection.clone(), "index"),
        (HttpMethod::Post, collection.clone(), "store"),
        (HttpMethod::Get, item.clone(), "show"),
        (HttpMethod::Put, item.clone(), "update"),
        (HttpMethod::Delete, item.clone(), "destroy"),
    ];
    if !api_only {
        actions.insert(1, (HttpMethod::Get, format!("{}/create", collection), "create"));
        actions.insert(4, (HttpMethod::Get, format!("{}/edit", item), "edit"));
    }
    actions
        .into_iter()
        .map(|(method, pattern, action)| {
            RouteMatch::new(method, &pattern, format!("{}.{}", controller, action))
        })
        .collect()
}

fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = word.strip_suffix('s') {
        stem.to_string()
    } else {
        word.to_string()
    }
}

struct SlimRoutes;

impl IdiomMatcher for SlimRoutes {
    fn family(&self) -> IdiomFamily {
        IdiomFamily::Slim
    }

    fn matches(&self, ctx: &LineContext<'_>) -> bool {
        ctx.code.contains("$app->") || ctx.code.contains("$group->")
    }

    fn extract(&self, ctx: &LineContext<'_>) -> Vec<RouteMatch> {
        let stmt = ctx.statement();
        let mut routes = Vec::new();

        if let Some(caps) = SLIM_VERB.captures(&stmt) {
            routes.push(RouteMatch::new(
                HttpMethod::parse(&caps[1]),
                &caps[2],
                parse_handler(&caps[3]),
            ));
        } else if let Some(caps) = SLIM_MAP.captures(&stmt) {
            let handler = parse_handler(&caps[3]);
            for verb in quoted_list(&caps[1]) {
                routes.push(RouteMatch::new(HttpMethod::parse(&verb), &caps[2], handler.clone()));
            }
        }

        let middleware: Vec<String> = SLIM_ADD
            .captures_iter(&stmt)
            .map(|c| short_name(&c[1]).to_string())
            .collect();
        for route in &mut routes {
            route.middleware.extend(middleware.iter().cloned());
        }
        routes
    }
}

struct CodeIgniterRoutes;

impl IdiomMatcher for CodeIgniterRoutes {
    fn family(&self) -> IdiomFamily {
        IdiomFamily::CodeIgniter
    }

    fn matches(&self, ctx: &LineContext<'_>) -> bool {
        ctx.code.contains("$route[") || ctx.code.contains("$routes->")
    }

    fn extract(&self, ctx: &LineContext<'_>) -> Vec<RouteMatch> {
        if let Some(caps) = CI_ROUTE.captures(ctx.text) {
            let pattern = &caps[1];
            let target = &caps[3];
            if pattern == "404_override" || pattern == "translate_uri_dashes" {
                return Vec::new();
            }
            let method = match caps.get(2) {
                Some(verb) => HttpMethod::parse(verb.as_str()),
                None => infer_method(pattern, target),
            };
            let pattern = if pattern == "default_controller" { "/" } else { pattern };
            return vec![RouteMatch::new(method, pattern, segment_handler(target))];
        }

        let stmt = ctx.statement();
        if let Some(caps) = CI4_ROUTE.captures(&stmt) {
            return vec![RouteMatch::new(
                HttpMethod::parse(&caps[1]),
                &caps[2],
                parse_handler(&caps[3]),
            )];
        }
        Vec::new()
    }
}

/// Guess the verb of a verb-less route from the words in it.
fn infer_method(pattern: &str, target: &str) -> HttpMethod {
    let words = format!("{} {}", pattern, target).to_lowercase();
    if ["create", "store", "add", "save"].iter().any(|w| words.contains(w)) {
        HttpMethod::Post
    } else if ["update", "edit"].iter().any(|w| words.contains(w)) {
        HttpMethod::Put
    } else if ["delete", "remove", "destroy"].iter().any(|w| words.contains(w)) {
        HttpMethod::Delete
    } else {
        HttpMethod::Get
    }
}

/// `users/show/$1` becomes `users.show`; a bare controller maps to `index`.
fn segment_handler(target: &str) -> String {
    let mut parts = target.split('/').filter(|p| !p.is_empty() && !p.starts_with('$'));
    match (parts.next(), parts.next()) {
        (Some(controller), Some(action)) => format!("{}.{}", controller, action),
        (Some(controller), None) => format!("{}.index", controller),
        _ => target.to_string(),
    }
}

struct SymfonyRoutes;

enum AttributeTarget {
    Class(String),
    Method(String),
}

impl SymfonyRoutes {
    fn arguments<'a>(ctx: &LineContext<'a>) -> Option<String> {
        SYMFONY_ATTRIBUTE
            .captures(ctx.text)
            .or_else(|| SYMFONY_ANNOTATION.captures(ctx.raw))
            .map(|c| c[1].to_string())
    }

    /// The declaration an attribute on this line belongs to, and whether
    /// access control was declared alongside it.
    fn target(ctx: &LineContext<'_>) -> (Option<AttributeTarget>, bool) {
        let mut guarded = ctx.raw.contains("IsGranted");
        for line in ctx.raw_following.iter().take(ATTRIBUTE_LOOKAHEAD) {
            let trimmed = line.trim();
            if trimmed.contains("IsGranted") || trimmed.contains("@Security") {
                guarded = true;
            }
            if let Some(c) = CLASS_DECL.captures(trimmed) {
                return (Some(AttributeTarget::Class(c[1].to_string())), guarded);
            }
            if let Some(c) = FUNCTION_DECL.captures(trimmed) {
                return (Some(AttributeTarget::Method(c[1].to_string())), guarded);
            }
        }
        (None, guarded)
    }
}

/// The route path, named (`path:` or `path=`) or as the first positional argument.
fn route_path(args: &str) -> Option<String> {
    SYMFONY_NAMED_PATH
        .captures(args)
        .or_else(|| SYMFONY_PATH.captures(args))
        .map(|c| c[1].to_string())
}

impl IdiomMatcher for SymfonyRoutes {
    fn family(&self) -> IdiomFamily {
        IdiomFamily::Symfony
    }

    fn matches(&self, ctx: &LineContext<'_>) -> bool {
        // annotations only count inside comments
        ctx.code.contains("#[Route") || (ctx.raw.contains("@Route") && !ctx.text.contains("@Route"))
    }

    fn extract(&self, ctx: &LineContext<'_>) -> Vec<RouteMatch> {
        let Some(args) = Self::arguments(ctx) else {
            return Vec::new();
        };
        let Some(path) = route_path(&args) else {
            return Vec::new();
        };
        let (target, guarded) = Self::target(ctx);
        let handler = match target {
            Some(AttributeTarget::Method(name)) => match ctx.current_class {
                Some(class) => format!("{}.{}", class, name),
                None => name,
            },
            // Class-level routes are prefixes, not endpoints.
            Some(AttributeTarget::Class(_)) => return Vec::new(),
            None => "unknown".to_string(),
        };

        let verbs = SYMFONY_METHODS
            .captures(&args)
            .map(|c| quoted_list(&c[1]))
            .unwrap_or_default();
        let methods: Vec<HttpMethod> = if verbs.is_empty() {
            vec![HttpMethod::Other]
        } else {
            verbs.iter().map(|v| HttpMethod::parse(v)).collect()
        };

        methods
            .into_iter()
            .map(|method| {
                let mut route = RouteMatch::new(method, &path, handler.clone());
                route.auth = guarded;
                route
            })
            .collect()
    }
}

/// Fallback for hand-rolled front controllers that branch on the request method.
struct RequestMethodChecks;

impl IdiomMatcher for RequestMethodChecks {
    fn family(&self) -> IdiomFamily {
        IdiomFamily::Generic
    }

    fn matches(&self, ctx: &LineContext<'_>) -> bool {
        ctx.text.contains("REQUEST_METHOD") && ctx.code.contains("$_SERVER[")
    }

    fn extract(&self, ctx: &LineContext<'_>) -> Vec<RouteMatch> {
        let pattern = if ctx.file_stem.eq_ignore_ascii_case("index") {
            "/".to_string()
        } else {
            format!("/{}", ctx.file_stem)
        };

        let mut verbs: Vec<String> = REQUEST_METHOD_CHECK
            .captures_iter(ctx.text)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();

        if REQUEST_METHOD_SWITCH.is_match(ctx.text) {
            let mut depth = 0i32;
            let mut opened = ctx.text.contains('{');
            depth += super::brace_delta(ctx.text);
            for line in ctx.following {
                if opened && depth <= 0 {
                    break;
                }
                verbs.extend(CASE_ARM.captures_iter(line).map(|c| c[1].to_string()));
                depth += super::brace_delta(line);
                opened |= line.contains('{');
            }
        }

        verbs
            .iter()
            .map(|verb| RouteMatch::new(HttpMethod::parse(verb), &pattern, ctx.file_name.to_string()))
            .collect()
    }
}

/// Parse the handler argument of a route declaration.
fn parse_handler(rest: &str) -> String {
    let rest = rest.trim();
    if let Some(c) = HANDLER_ARRAY.captures(rest) {
        return format!("{}.{}", short_name(&c[1]), &c[2]);
    }
    for re in [&*HANDLER_AT, &*HANDLER_DOUBLE_COLON, &*HANDLER_COLON] {
        if let Some(c) = re.captures(rest) {
            return format!("{}.{}", short_name(&c[1]), &c[2]);
        }
    }
    if HANDLER_CLOSURE.is_match(rest) {
        return "closure".to_string();
    }
    if let Some(c) = HANDLER_CONCAT.captures(rest) {
        return format!("{}.{}", short_name(&c[1]), &c[2]);
    }
    if let Some(c) = HANDLER_INVOKABLE.captures(rest) {
        return format!("{}.__invoke", short_name(&c[1]));
    }
    if let Some(c) = HANDLER_STRING.captures(rest) {
        return c[1].to_string();
    }
    "unknown".to_string()
}

/// `App\Http\Controllers\UserController` becomes `UserController`.
fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

fn quoted_list(list: &str) -> Vec<String> {
    QUOTED.captures_iter(list).map(|c| c[1].to_string()).collect()
}

/// Leading slash, no trailing slash, no doubled slashes. Placeholders are untouched.
fn normalize_pattern(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.trim().split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn join_prefix(prefix: &str, pattern: &str) -> String {
    normalize_pattern(&format!("{}/{}", prefix, pattern))
}

/// Placeholder names in order of appearance.
fn route_parameters(pattern: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for re in [&*BRACE_PARAM, &*SEGMENT_PARAM, &*COLON_PARAM] {
        for c in re.captures_iter(pattern) {
            if let (Some(whole), Some(name)) = (c.get(0), c.get(1)) {
                found.push((whole.start(), name.as_str().to_string()));
            }
        }
    }
    found.sort();
    found.into_iter().map(|(_, name)| name).collect()
}

fn requires_auth(middleware: &[String]) -> bool {
    middleware.iter().any(|m| {
        let lower = m.to_lowercase();
        AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
    })
}

#[derive(Debug)]
struct GroupScope {
    prefix: String,
    middleware: Vec<String>,
    open_depth: i32,
    entered: bool,
}

/// A group declaration joined with its continuation lines, up to the closure.
fn group_header(text: &str, following: &[&str]) -> String {
    let mut header = text.trim().to_string();
    if !(header.contains("Route::") || header.contains("$router->")) {
        return header;
    }
    for next in following.iter().take(GROUP_LOOKAHEAD) {
        if header.contains(';')
            || header.contains('{')
            || header.contains("function")
            || header.contains("fn (")
            || header.contains("fn(")
        {
            break;
        }
        header.push(' ');
        header.push_str(next.trim());
    }
    header
}

fn group_scope(text: &str, depth: i32) -> Option<GroupScope> {
    let (prefix, middleware) = if LARAVEL_GROUP.is_match(text) {
        let prefix = GROUP_PREFIX.captures(text).map(|c| c[1].to_string());
        let middleware = GROUP_MIDDLEWARE
            .captures(text)
            .map(|c| quoted_list(&c[1]))
            .unwrap_or_default();
        (prefix.unwrap_or_default(), middleware)
    } else if let Some(c) = SLIM_GROUP.captures(text) {
        (c[1].to_string(), Vec::new())
    } else {
        return None;
    };
    Some(GroupScope {
        prefix,
        middleware,
        open_depth: depth + 1,
        entered: false,
    })
}

/// Recover routes declared in one file, in line order.
///
/// Records carry `id == 0` and no `duplicate_of`; both are assigned
/// project-wide by [`link_duplicates`].
pub fn detect_endpoints(file: &SourceFile) -> Vec<EndpointRecord> {
    let scrubbed = Scrubbed::new(&file.text);
    let text_lines: Vec<&str> = scrubbed.text.split('\n').collect();
    let code_lines: Vec<&str> = scrubbed.code.split('\n').collect();
    let raw_lines: Vec<&str> = file.text.split('\n').collect();

    let file_name = file.rel_path.rsplit('/').next().unwrap_or(&file.rel_path);
    let response_format = if JSON_RESPONSE.is_match(&scrubbed.text) {
        ResponseFormat::Json
    } else {
        ResponseFormat::Html
    };
    let guarded_file = AUTH_GUARD.is_match(&scrubbed.text);
    let class_prefixes = symfony_class_prefixes(&text_lines, &code_lines, &raw_lines);

    let mut records = Vec::new();
    let mut groups: Vec<GroupScope> = Vec::new();
    let mut current_class: Option<String> = None;
    let mut depth = 0i32;

    for (idx, text) in text_lines.iter().enumerate() {
        if let Some(c) = CLASS_DECL.captures(text) {
            current_class = Some(c[1].to_string());
        }
        let code = code_lines.get(idx).copied().unwrap_or("");
        if GROUP_CALLERS.iter().any(|caller| code.contains(caller)) {
            if let Some(scope) = group_scope(&group_header(text, &text_lines[idx + 1..]), depth) {
                groups.push(scope);
            }
        }

        let ctx = LineContext {
            text,
            code,
            raw: raw_lines.get(idx).copied().unwrap_or(""),
            following: &text_lines[idx + 1..],
            raw_following: raw_lines.get(idx + 1..).unwrap_or(&[]),
            file_name,
            file_stem: file.stem(),
            current_class: current_class.as_deref(),
        };

        let hit = registry().iter().find_map(|matcher| {
            if !matcher.matches(&ctx) {
                return None;
            }
            let routes = matcher.extract(&ctx);
            (!routes.is_empty()).then(|| (matcher.family(), routes))
        });

        if let Some((family, routes)) = hit {
            for route in routes {
                let (pattern, middleware) = match family {
                    IdiomFamily::Laravel | IdiomFamily::Slim => {
                        let prefix: Vec<&str> = groups.iter().map(|g| g.prefix.as_str()).collect();
                        let mut middleware: Vec<String> =
                            groups.iter().flat_map(|g| g.middleware.iter().cloned()).collect();
                        middleware.extend(route.middleware);
                        (join_prefix(&prefix.join("/"), &route.pattern), middleware)
                    }
                    IdiomFamily::Symfony => {
                        let prefix = current_class
                            .as_ref()
                            .and_then(|c| class_prefixes.get(c))
                            .map(String::as_str)
                            .unwrap_or("");
                        (join_prefix(prefix, &route.pattern), route.middleware)
                    }
                    _ => (normalize_pattern(&route.pattern), route.middleware),
                };

                let declared_auth_requirement = route.auth
                    || requires_auth(&middleware)
                    || (family == IdiomFamily::Generic && guarded_file);

                records.push(EndpointRecord {
                    id: 0,
                    http_method: route.method,
                    parameters: route_parameters(&pattern),
                    url_pattern: pattern,
                    handler_reference: route.handler,
                    middleware,
                    declared_auth_requirement,
                    response_format,
                    family,
                    file: file.rel_path.clone(),
                    line: idx + 1,
                    duplicate_of: None,
                });
            }
        }

        depth += super::brace_delta(code);
        for group in groups.iter_mut() {
            if depth >= group.open_depth {
                group.entered = true;
            }
        }
        while groups
            .last()
            .map_or(false, |g| g.entered && depth < g.open_depth)
        {
            groups.pop();
        }
    }

    records
}

/// Class name to route prefix, from class-level Symfony route attributes.
fn symfony_class_prefixes(
    text_lines: &[&str],
    code_lines: &[&str],
    raw_lines: &[&str],
) -> HashMap<String, String> {
    let mut prefixes = HashMap::new();
    for (idx, text) in text_lines.iter().enumerate() {
        let raw = raw_lines.get(idx).copied().unwrap_or("");
        let ctx = LineContext {
            text,
            code: code_lines.get(idx).copied().unwrap_or(""),
            raw,
            following: &text_lines[idx + 1..],
            raw_following: raw_lines.get(idx + 1..).unwrap_or(&[]),
            file_name: "",
            file_stem: "",
            current_class: None,
        };
        if !SymfonyRoutes.matches(&ctx) {
            continue;
        }
        let Some(args) = SymfonyRoutes::arguments(&ctx) else { continue };
        let Some(path) = route_path(&args) else { continue };
        if let (Some(AttributeTarget::Class(name)), _) = SymfonyRoutes::target(&ctx) {
            prefixes.insert(name, path);
        }
    }
    prefixes
}

/// Assign project-wide ids and link later duplicates of `(method, pattern)`
/// to the first record that declared it. Records are never merged or dropped.
pub fn link_duplicates(records: &mut [EndpointRecord]) {
    let mut first_seen: HashMap<(HttpMethod, String), usize> = HashMap::new();
    for (idx, record) in records.iter_mut().enumerate() {
        record.id = idx;
        let key = (record.http_method, record.url_pattern.clone());
        match first_seen.get(&key) {
            Some(&primary) => record.duplicate_of = Some(primary),
            None => {
                record.duplicate_of = None;
                first_seen.insert(key, idx);
            }
        }
    }
}
