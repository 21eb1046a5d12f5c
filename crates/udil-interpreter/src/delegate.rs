//! Delegate runtimes behind `sync("program", ...)`.
//!
//! A delegated run has two halves. Source synthesis ([`script_source`],
//! [`jvm_unit`]) turns the staged `context-in` / `context-out` entries and the
//! user's program text into something the external runtime can execute. The
//! runtime traits ([`ScriptRuntime`], [`JvmRuntime`]) execute that and hand
//! back the harvested output values in order. The process-backed runtimes
//! shell out to the configured [`Toolchain`].

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use regex::Regex;
use udil_syntax::ast::TypeTag;

use crate::error::DelegateError;
use crate::value::Value;

/// Prefix of the stdout lines that carry harvested values.
pub const OUTPUT_MARKER: &str = "__UDIL_OUT__";

const ACCESSOR_PREFIX: &str = "__udil_get_";
const HARNESS_CLASS: &str = "UdilHarness";

/// Executable paths for the external delegates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub python: String,
    pub javac: String,
    pub java: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
        }
    }
}

impl Toolchain {
    /// Defaults overridden by `UDIL_PYTHON`, `UDIL_JAVAC` and `UDIL_JAVA`.
    pub fn from_env() -> Self {
        let mut toolchain = Self::default();
        if let Ok(p) = std::env::var("UDIL_PYTHON") {
            toolchain.python = p;
        }
        if let Ok(p) = std::env::var("UDIL_JAVAC") {
            toolchain.javac = p;
        }
        if let Ok(p) = std::env::var("UDIL_JAVA") {
            toolchain.java = p;
        }
        toolchain
    }
}

pub trait ScriptRuntime {
    /// Runs a synthesized script and returns its outputs in `context-out` order.
    fn run(&self, toolchain: &Toolchain, script: &str) -> Result<Vec<Value>, DelegateError>;
}

pub trait JvmRuntime {
    /// Compiles and runs `unit`, returning one value per accessor.
    fn run(&self, toolchain: &Toolchain, unit: &JvmUnit) -> Result<Vec<Value>, DelegateError>;
}

/// A `context-out` name harvested through a generated static accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub name: String,
    pub ty: TypeTag,
}

impl Accessor {
    pub fn method(&self) -> String {
        format!("{}{}", ACCESSOR_PREFIX, self.name)
    }

    fn java_type(&self) -> &'static str {
        java_type(self.ty).unwrap_or("Object")
    }
}

/// An augmented compilation unit ready for the JVM runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct JvmUnit {
    pub class_name: String,
    pub source: String,
    pub accessors: Vec<Accessor>,
}

fn java_type(tag: TypeTag) -> Option<&'static str> {
    match tag {
        TypeTag::Int => Some("int"),
        TypeTag::Real => Some("double"),
        TypeTag::Text => Some("String"),
        _ => None,
    }
}

fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn real_literal(x: f64, nan: &str, inf: &str) -> String {
    if x.is_nan() {
        nan.to_string()
    } else if x.is_infinite() {
        format!("{}{}", if x < 0.0 { "-" } else { "" }, inf)
    } else {
        format!("{:?}", x)
    }
}

/// Renders a value as a script literal.
pub fn script_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Real(x) => real_literal(*x, "float('nan')", "float('inf')"),
        Value::Text(s) => quoted(s),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(script_literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Block(stmt) => quoted(&stmt.to_string()),
    }
}

/// Input assignments, then the program, then an epilogue that prints every
/// `context-out` name as one JSON line.
pub fn script_source(
    context_in: &[(String, Value)],
    context_out: &[(String, Value)],
    program: &str,
) -> String {
    let mut code = String::new();
    for (name, value) in context_in {
        code.push_str(&format!("{} = {}\n", name, script_literal(value)));
    }
    code.push_str(program);
    code.push_str("\n__udil_out = []\n");
    for (name, _) in context_out {
        code.push_str(&format!("__udil_out.append({})\n", name));
    }
    code.push_str("import json as __udil_json\n");
    code.push_str(&format!(
        "print({} + __udil_json.dumps(__udil_out, default=str))\n",
        quoted(OUTPUT_MARKER)
    ));
    code
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Int(b as i64),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Int(i),
            (None, Some(x)) => Value::Real(x),
            _ => Value::Text(n.to_string()),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        other => Value::Text(other.to_string()),
    }
}

/// Splits script stdout into the harvested values and the program's own output.
pub fn decode_script_output(stdout: &str) -> Result<(Vec<Value>, String), DelegateError> {
    let mut passthrough = String::new();
    let mut payload = None;
    for line in stdout.lines() {
        match line.strip_prefix(OUTPUT_MARKER) {
            Some(rest) => payload = Some(rest),
            None => {
                passthrough.push_str(line);
                passthrough.push('\n');
            }
        }
    }
    let payload = payload.ok_or_else(|| DelegateError::BadOutput("no output line".to_string()))?;
    let decoded: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| DelegateError::BadOutput(e.to_string()))?;
    match decoded {
        serde_json::Value::Array(items) => {
            Ok((items.into_iter().map(from_json).collect(), passthrough))
        }
        other => Err(DelegateError::BadOutput(format!("expected a list, got {}", other))),
    }
}

/// Injects `context-in` fields and `context-out` accessors into the first
/// public class of `program`.
///
/// Accessors are generated for `context-out` entries whose placeholder value
/// names a type (`"int"`, `"real"` or `"text"`); other entries are left alone.
pub fn jvm_unit(
    context_in: &[(String, Value)],
    context_out: &[(String, Value)],
    program: &str,
) -> Result<JvmUnit, DelegateError> {
    let class_re = Regex::new(r"public\s+class\s+(\w+)\s*\{")
        .map_err(|e| DelegateError::Runtime(e.to_string()))?;
    let caps = class_re
        .captures(program)
        .ok_or(DelegateError::EntryPointNotFound)?;
    let (Some(whole), Some(class)) = (caps.get(0), caps.get(1)) else {
        return Err(DelegateError::EntryPointNotFound);
    };
    let class_name = class.as_str().to_string();

    let mut extra = String::from("\n");
    for (name, value) in context_in {
        let field = match value {
            Value::Int(n) => format!("static int {} = {};\n", name, n),
            Value::Real(x) => format!(
                "static double {} = {};\n",
                name,
                real_literal(*x, "Double.NaN", "Double.POSITIVE_INFINITY")
            ),
            Value::Text(s) => format!("static String {} = {};\n", name, quoted(s)),
            other => {
                tracing::debug!(name = %name, value = %other, "no field type for context-in value");
                continue;
            }
        };
        extra.push_str(&field);
    }
    let mut accessors = Vec::new();
    for (name, placeholder) in context_out {
        let ty = match placeholder {
            Value::Text(t) => TypeTag::from_name(t).filter(|tag| java_type(*tag).is_some()),
            _ => None,
        };
        if let Some(ty) = ty {
            let accessor = Accessor {
                name: name.clone(),
                ty,
            };
            extra.push_str(&format!(
                "public static {} {}(int unused) {{ return {}; }}\n",
                accessor.java_type(),
                accessor.method(),
                name
            ));
            accessors.push(accessor);
        }
    }

    let at = whole.end();
    let source = format!("{}{}{}", &program[..at], extra, &program[at..]);
    Ok(JvmUnit {
        class_name,
        source,
        accessors,
    })
}

/// Java source of the class that runs `unit` and prints its accessors.
pub fn jvm_harness(unit: &JvmUnit) -> String {
    let mut body = String::new();
    body.push_str(&format!("        new {}();\n", unit.class_name));
    body.push_str(&format!("        {}.main(null);\n", unit.class_name));
    for accessor in &unit.accessors {
        body.push_str(&format!(
            "        emit({}.{}(0));\n",
            unit.class_name,
            accessor.method()
        ));
    }
    format!(
        "public class {harness} {{\n    static void emit(Object v) {{\n        String s = String.valueOf(v).replace(\"\\\\\", \"\\\\\\\\\").replace(\"\\n\", \"\\\\n\");\n        System.out.println({marker} + s);\n    }}\n    public static void main(String[] args) throws Exception {{\n{body}    }}\n}}\n",
        harness = HARNESS_CLASS,
        marker = quoted(OUTPUT_MARKER),
        body = body
    )
}

fn unescape_line(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parses the harness's marker lines by accessor type.
pub fn decode_jvm_output(
    stdout: &str,
    accessors: &[Accessor],
) -> Result<(Vec<Value>, String), DelegateError> {
    let mut passthrough = String::new();
    let mut raw = Vec::new();
    for line in stdout.lines() {
        match line.strip_prefix(OUTPUT_MARKER) {
            Some(rest) => raw.push(unescape_line(rest)),
            None => {
                passthrough.push_str(line);
                passthrough.push('\n');
            }
        }
    }
    if raw.len() != accessors.len() {
        return Err(DelegateError::BadOutput(format!(
            "expected {} values, got {}",
            accessors.len(),
            raw.len()
        )));
    }
    let bad = |s: &str, a: &Accessor| {
        DelegateError::BadOutput(format!("'{}' is not a valid {} for {}", s, a.ty, a.name))
    };
    let mut values = Vec::with_capacity(raw.len());
    for (text, accessor) in raw.into_iter().zip(accessors) {
        let value = match accessor.ty {
            TypeTag::Int => Value::Int(text.trim().parse().map_err(|_| bad(&text, accessor))?),
            TypeTag::Real => Value::Real(text.trim().parse().map_err(|_| bad(&text, accessor))?),
            _ => Value::Text(text),
        };
        values.push(value);
    }
    Ok((values, passthrough))
}

fn run_checked(cmd: &mut Command, fail: fn(String) -> DelegateError) -> Result<Output, DelegateError> {
    let output = cmd.output()?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(fail(String::from_utf8_lossy(&output.stderr).trim().to_string()))
    }
}

/// Copies delegate stdout that was not part of the result onto `out`.
fn forward(out: &mut impl Write, text: &str) -> std::io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn pass_through(text: &str) {
    if let Err(error) = forward(&mut std::io::stdout(), text) {
        tracing::warn!(%error, "could not forward delegate output");
    }
}

/// Runs scripts with the toolchain's `python` executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessScript;

impl ScriptRuntime for ProcessScript {
    fn run(&self, toolchain: &Toolchain, script: &str) -> Result<Vec<Value>, DelegateError> {
        let mut file = tempfile::Builder::new()
            .prefix("udil-")
            .suffix(".py")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        tracing::info!(python = %toolchain.python, path = %file.path().display(), "running script delegate");
        let output = run_checked(
            Command::new(&toolchain.python).arg(file.path()),
            DelegateError::Runtime,
        )?;
        let (values, passthrough) = decode_script_output(&String::from_utf8_lossy(&output.stdout))?;
        pass_through(&passthrough);
        Ok(values)
    }
}

/// Compiles with `javac` and runs with `java` inside a temporary directory
/// that is removed on every exit path.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessJvm;

impl ProcessJvm {
    fn run_in(dir: &Path, toolchain: &Toolchain, unit: &JvmUnit) -> Result<Vec<Value>, DelegateError> {
        let unit_path = dir.join(format!("{}.java", unit.class_name));
        let harness_path = dir.join(format!("{}.java", HARNESS_CLASS));
        fs::write(&unit_path, &unit.source)?;
        fs::write(&harness_path, jvm_harness(unit))?;

        tracing::info!(javac = %toolchain.javac, class = %unit.class_name, "compiling jvm delegate");
        run_checked(
            Command::new(&toolchain.javac)
                .arg("-d")
                .arg(dir)
                .arg(&unit_path)
                .arg(&harness_path),
            DelegateError::Compile,
        )?;

        tracing::info!(java = %toolchain.java, class = %unit.class_name, "running jvm delegate");
        let output = run_checked(
            Command::new(&toolchain.java)
                .arg("-Dfile.encoding=UTF-8")
                .arg("-cp")
                .arg(dir)
                .arg(HARNESS_CLASS),
            DelegateError::Runtime,
        )?;
        let (values, passthrough) =
            decode_jvm_output(&String::from_utf8_lossy(&output.stdout), &unit.accessors)?;
        pass_through(&passthrough);
        Ok(values)
    }
}

impl JvmRuntime for ProcessJvm {
    fn run(&self, toolchain: &Toolchain, unit: &JvmUnit) -> Result<Vec<Value>, DelegateError> {
        let dir = tempfile::TempDir::new()?;
        let result = Self::run_in(dir.path(), toolchain, unit);
        tracing::info!(path = %dir.path().display(), "removing jvm delegate artifacts");
        dir.close()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(items: &[(&str, Value)]) -> Vec<(String, Value)> {
        items
            .iter()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect()
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_forward_reports_write_failures() {
        let mut out = Vec::new();
        forward(&mut out, "hello\n").unwrap();
        assert_eq!(out, b"hello\n");

        let err = forward(&mut ClosedPipe, "hello\n").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert!(forward(&mut ClosedPipe, "").is_ok());
    }

    #[test]
    fn test_script_source_layout() {
        let inputs = pairs(&[
            ("a", Value::Int(10010)),
            ("s", Value::Text("say \"hi\"".into())),
            ("l", Value::List(vec![Value::Real(1.5), Value::Null])),
        ]);
        let outputs = pairs(&[("b", Value::Int(0))]);
        let src = script_source(&inputs, &outputs, "\nb = a + 76\n");
        assert_eq!(
            src,
            "a = 10010\ns = \"say \\\"hi\\\"\"\nl = [1.5, None]\n\nb = a + 76\n\n__udil_out = []\n__udil_out.append(b)\nimport json as __udil_json\nprint(\"__UDIL_OUT__\" + __udil_json.dumps(__udil_out, default=str))\n"
        );
    }

    #[test]
    fn test_decode_script_output() {
        let (values, rest) =
            decode_script_output("hello\n__UDIL_OUT__[10086, 2.5, \"x\", [true], null]\n").unwrap();
        assert_eq!(
            values,
            vec![
                Value::Int(10086),
                Value::Real(2.5),
                Value::Text("x".into()),
                Value::List(vec![Value::Int(1)]),
                Value::Null,
            ]
        );
        assert_eq!(rest, "hello\n");
        assert!(matches!(
            decode_script_output("nothing here"),
            Err(DelegateError::BadOutput(_))
        ));
    }

    #[test]
    fn test_jvm_unit_injection() {
        let program = "\npublic class HelloWorld {\n    static int output = 0;\n}\n";
        let inputs = pairs(&[("input", Value::Int(23)), ("name", Value::Text("n".into()))]);
        let outputs = pairs(&[
            ("output", Value::Text("int".into())),
            ("skipped", Value::Int(0)),
        ]);
        let unit = jvm_unit(&inputs, &outputs, program).unwrap();
        assert_eq!(unit.class_name, "HelloWorld");
        assert_eq!(
            unit.accessors,
            vec![Accessor {
                name: "output".into(),
                ty: TypeTag::Int
            }]
        );
        assert_eq!(
            unit.source,
            "\npublic class HelloWorld {\nstatic int input = 23;\nstatic String name = \"n\";\npublic static int __udil_get_output(int unused) { return output; }\n\n    static int output = 0;\n}\n"
        );
        assert!(jvm_harness(&unit).contains("emit(HelloWorld.__udil_get_output(0));"));
        assert!(matches!(
            jvm_unit(&inputs, &outputs, "class Hidden {}"),
            Err(DelegateError::EntryPointNotFound)
        ));
    }

    #[test]
    fn test_decode_jvm_output() {
        let accessors = vec![
            Accessor {
                name: "n".into(),
                ty: TypeTag::Int,
            },
            Accessor {
                name: "t".into(),
                ty: TypeTag::Text,
            },
        ];
        let (values, rest) =
            decode_jvm_output("2306\n__UDIL_OUT__2306\n__UDIL_OUT__a\\nb\n", &accessors).unwrap();
        assert_eq!(values, vec![Value::Int(2306), Value::Text("a\nb".into())]);
        assert_eq!(rest, "2306\n");
        assert!(decode_jvm_output("__UDIL_OUT__x\n__UDIL_OUT__y\n", &accessors).is_err());
        assert!(decode_jvm_output("__UDIL_OUT__1\n", &accessors).is_err());
    }
}
