//! Static lookup of known PHP packages and extensions.
//!
//! Keys are lowercase composer names (`vendor/package`) or `ext-<name>`.
//! The capability string is what de-duplication keys on: an inferred
//! `ext-curl` is dropped when a declared package already provides
//! `http_client`.

use phf::phf_map;

use crate::facts::{DependencyCategory, Tier};

/// Known equivalent for a PHP dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub target: &'static str,
    pub category: DependencyCategory,
    pub capability: &'static str,
    pub complexity: Tier,
}

const fn map(
    target: &'static str,
    category: DependencyCategory,
    capability: &'static str,
    complexity: Tier,
) -> Mapping {
    Mapping {
        target,
        category,
        capability,
        complexity,
    }
}

use DependencyCategory::{Auth, Db, Dev, Util, Web};
use Tier::{High, Low, Medium};

static PACKAGES: phf::Map<&'static str, Mapping> = phf_map! {
    // frameworks
    "laravel/framework" => map("fastapi", Web, "framework", High),
    "laravel/lumen-framework" => map("fastapi", Web, "framework", Medium),
    "symfony/symfony" => map("fastapi", Web, "framework", High),
    "symfony/framework-bundle" => map("fastapi", Web, "framework", High),
    "codeigniter/framework" => map("fastapi", Web, "framework", Medium),
    "codeigniter4/framework" => map("fastapi", Web, "framework", Medium),
    "slim/slim" => map("fastapi", Web, "framework", Low),
    "slim/psr7" => map("starlette", Web, "http_messages", Low),
    "symfony/http-foundation" => map("starlette", Web, "http_messages", Low),
    "symfony/routing" => map("fastapi", Web, "routing", Low),
    "symfony/console" => map("typer", Util, "cli", Low),

    // database
    "doctrine/dbal" => map("sqlalchemy", Db, "db", Medium),
    "doctrine/orm" => map("sqlalchemy", Db, "orm", High),
    "illuminate/database" => map("sqlalchemy", Db, "orm", Medium),
    "propel/propel" => map("sqlalchemy", Db, "orm", High),
    "doctrine/migrations" => map("alembic", Db, "migrations", Medium),
    "robmorgan/phinx" => map("alembic", Db, "migrations", Medium),
    "mongodb/mongodb" => map("motor", Db, "mongodb", Low),
    "predis/predis" => map("redis", Db, "cache", Low),

    // http clients
    "guzzlehttp/guzzle" => map("httpx", Web, "http_client", Low),
    "rmccue/requests" => map("httpx", Web, "http_client", Low),
    "symfony/http-client" => map("httpx", Web, "http_client", Low),

    // auth and crypto
    "firebase/php-jwt" => map("python-jose", Auth, "jwt", Low),
    "tymon/jwt-auth" => map("python-jose", Auth, "jwt", Medium),
    "lcobucci/jwt" => map("python-jose", Auth, "jwt", Low),
    "laravel/sanctum" => map("fastapi-users", Auth, "auth", Medium),
    "laravel/passport" => map("authlib", Auth, "oauth", High),
    "league/oauth2-server" => map("authlib", Auth, "oauth", High),
    "league/oauth2-client" => map("authlib", Auth, "oauth", Medium),
    "defuse/php-encryption" => map("cryptography", Auth, "crypto", Medium),

    // validation and serialization
    "respect/validation" => map("pydantic", Util, "validation", Medium),
    "vlucas/valitron" => map("pydantic", Util, "validation", Low),
    "jms/serializer" => map("pydantic", Util, "serialization", Medium),
    "symfony/serializer" => map("pydantic", Util, "serialization", Medium),
    "vlucas/phpdotenv" => map("python-dotenv", Util, "env", Low),

    // utilities
    "monolog/monolog" => map("loguru", Util, "logging", Low),
    "psr/log" => map("loguru", Util, "logging", Low),
    "nesbot/carbon" => map("arrow", Util, "datetime", Low),
    "cakephp/chronos" => map("arrow", Util, "datetime", Low),
    "twig/twig" => map("jinja2", Web, "templating", Medium),
    "smarty/smarty" => map("jinja2", Web, "templating", High),
    "league/flysystem" => map("boto3", Util, "storage", Medium),
    "intervention/image" => map("pillow", Util, "image", Medium),
    "phpmailer/phpmailer" => map("aiosmtplib", Util, "mail", Low),
    "swiftmailer/swiftmailer" => map("aiosmtplib", Util, "mail", Low),
    "ramsey/uuid" => map("uuid", Util, "uuid", Low),
    "mtdowling/cron-expression" => map("croniter", Util, "scheduling", Low),
    "dragonmantank/cron-expression" => map("croniter", Util, "scheduling", Low),
    "league/csv" => map("pandas", Util, "csv", Low),
    "phpoffice/phpspreadsheet" => map("openpyxl", Util, "spreadsheet", Medium),

    // development
    "phpunit/phpunit" => map("pytest", Dev, "testing", Medium),
    "mockery/mockery" => map("pytest-mock", Dev, "mocking", Low),
    "fakerphp/faker" => map("faker", Dev, "fixtures", Low),
    "fzaninotto/faker" => map("faker", Dev, "fixtures", Low),
    "squizlabs/php_codesniffer" => map("black", Dev, "lint", Low),
    "friendsofphp/php-cs-fixer" => map("black", Dev, "lint", Low),
    "phpstan/phpstan" => map("mypy", Dev, "static_analysis", Medium),
    "vimeo/psalm" => map("mypy", Dev, "static_analysis", Medium),

    // extensions
    "ext-curl" => map("httpx", Web, "http_client", Low),
    "ext-gd" => map("pillow", Util, "image", Medium),
    "ext-json" => map("json", Util, "json", Low),
    "ext-mysqli" => map("aiomysql", Db, "mysql", Medium),
    "ext-pdo" => map("sqlalchemy", Db, "db", Medium),
    "ext-pdo_mysql" => map("aiomysql", Db, "mysql", Medium),
    "ext-pdo_pgsql" => map("asyncpg", Db, "postgres", Medium),
    "ext-pdo_sqlite" => map("aiosqlite", Db, "sqlite", Low),
    "ext-redis" => map("redis", Db, "cache", Low),
    "ext-xml" => map("lxml", Util, "xml", Low),
    "ext-simplexml" => map("lxml", Util, "xml", Low),
    "ext-dom" => map("lxml", Util, "xml", Low),
    "ext-zip" => map("zipfile", Util, "archive", Low),
    "ext-bcmath" => map("decimal", Util, "decimal", Low),
    "ext-mbstring" => map("str", Util, "unicode", Low),
    "ext-openssl" => map("cryptography", Auth, "crypto", Medium),
    "ext-hash" => map("hashlib", Util, "hashing", Low),
    "ext-session" => map("itsdangerous", Auth, "session", Medium),
    "ext-fileinfo" => map("python-magic", Util, "mime", Low),
    "ext-mongodb" => map("motor", Db, "mongodb", Low),
};

/// In-source idioms that imply an extension, as `(extension, pattern)`.
pub const USAGE_PATTERNS: &[(&str, &str)] = &[
    ("curl", r"\bcurl_(?:init|exec|setopt)\s*\("),
    ("gd", r"\bimage(?:create\w*|jpeg|png|gif)\s*\("),
    ("json", r"\bjson_(?:encode|decode)\s*\("),
    ("mysqli", r"\bmysqli_(?:connect|query)\s*\(|\bnew\s+mysqli\b"),
    ("pdo", r"\bnew\s+PDO\s*\(|\bPDO::"),
    ("redis", r"\bnew\s+Redis\s*\(|\bRedis::"),
    ("xml", r"\bsimplexml_load_\w+\s*\(|\bnew\s+DOMDocument\b"),
    ("zip", r"\bnew\s+ZipArchive\b"),
    ("bcmath", r"\bbc(?:add|sub|mul|div)\s*\("),
    ("mbstring", r"\bmb_(?:strlen|substr|strtolower|strtoupper)\s*\("),
    ("openssl", r"\bopenssl_(?:encrypt|decrypt)\s*\("),
    ("hash", r"\bhash(?:_hmac)?\s*\("),
    ("session", r"\bsession_start\s*\(|\$_SESSION\b"),
    ("fileinfo", r"\bfinfo_open\s*\(|\bmime_content_type\s*\("),
    ("mongodb", r"MongoDB\\Client|MongoDB\\Driver\\"),
];

/// Look up a composer package or `ext-*` name, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static Mapping> {
    PACKAGES.get(name.to_lowercase().as_str())
}

/// Best-effort category for a package the table does not know.
pub fn infer_category(name: &str) -> DependencyCategory {
    let lower = name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["phpunit", "test", "mock", "faker", "debug", "phpstan", "lint", "codesniffer"]) {
        Dev
    } else if has(&["auth", "jwt", "oauth", "security", "crypt", "password", "acl"]) {
        Auth
    } else if has(&["db", "database", "orm", "sql", "mongo", "redis", "doctrine", "eloquent"]) {
        Db
    } else if has(&["http", "route", "routing", "framework", "psr7", "middleware", "api", "slim"]) {
        Web
    } else {
        Util
    }
}
