use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use vallum_contracts::{
    VALLUMC_REPORT_SCHEMA_VERSION, VALLUM_EVAL_REPORT_SCHEMA_VERSION, VALLUM_PARAMS_SCHEMA_VERSION,
};
use vallum_purposes::ScriptPurpose;
use vallumc::compile::{self, CompileOptions, CompilerError};
use vallumc::data::Data;
use vallumc::diagnostics::{Diagnostic, Report};
use vallumc::ir_eval::{self, Constant};
use vallumc::language;
use vallumc::program::Program;

#[derive(Parser)]
#[command(name = "vallumc")]
#[command(about = "Vallum compiler (typed contract AST -> closed IR).", long_about = None)]
struct Cli {
    /// Log debug events to stderr (same as RUST_LOG=vallumc=debug).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

/// The main script plus the modules it may import.
#[derive(clap::Args)]
struct Inputs {
    #[arg(long)]
    program: PathBuf,
    #[arg(long = "module", value_name = "PATH")]
    modules: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Cmd {
    LangId,
    Compile {
        #[command(flatten)]
        inputs: Inputs,
        /// Leave this top-level const of the main script open.
        #[arg(long, value_name = "NAME")]
        parametric: Vec<String>,
        /// Fail unless the main script has this purpose.
        #[arg(long, value_enum)]
        purpose: Option<ScriptPurpose>,
        /// Hex value of the `*Hash::CURRENT` members.
        #[arg(long, value_name = "HEX")]
        current_hash: Option<String>,
        #[arg(long, value_name = "STEPS")]
        max_eval_steps: Option<u64>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        report_json: bool,
    },
    Params {
        #[command(flatten)]
        inputs: Inputs,
        /// `NAME=<data json>`; applied in order.
        #[arg(long, value_name = "NAME=JSON")]
        set: Vec<String>,
    },
    Eval {
        #[command(flatten)]
        inputs: Inputs,
        /// Data argument (JSON) the compiled program is applied to.
        #[arg(long, value_name = "JSON")]
        arg: Vec<String>,
        #[arg(long, value_name = "STEPS")]
        max_eval_steps: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
struct CompileReport {
    schema_version: &'static str,
    command: &'static str,
    ok: bool,
    r#in: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ir_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<Value>,
    diagnostics: Report,
    exit_code: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match try_main(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vallumc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn try_main(cli: Cli) -> Result<ExitCode> {
    match cli.cmd {
        Cmd::LangId => {
            println!("{}", language::LANG_ID);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Compile {
            inputs,
            parametric,
            purpose,
            current_hash,
            max_eval_steps,
            out,
            report_json,
        } => {
            let (main, modules) = read_inputs(&inputs)?;
            let current_script_hash = current_hash
                .map(|h| hex::decode(h.trim()).context("parse --current-hash"))
                .transpose()?;
            let options = CompileOptions {
                parametric,
                current_script_hash,
                max_eval_steps,
            };
            let input = inputs.program.display().to_string();
            let output = match compile::compile_program(&main, &modules, &options)
                .and_then(|o| check_purpose(o, purpose))
            {
                Ok(o) => o,
                Err(err) => {
                    if report_json {
                        print_json(&CompileReport {
                            schema_version: VALLUMC_REPORT_SCHEMA_VERSION,
                            command: "compile",
                            ok: false,
                            r#in: input,
                            purpose: None,
                            ir_sha256: None,
                            parameters: Vec::new(),
                            diagnostics: Report::ok().with_diagnostics(vec![Diagnostic::from_error(&err)]),
                            exit_code: 1,
                        })?;
                    } else {
                        eprintln!("{err}");
                    }
                    return Ok(ExitCode::from(1));
                }
            };

            let text = output.ir_text();
            match &out {
                Some(path) => write_file(path, text.as_bytes())?,
                None if !report_json => println!("{text}"),
                None => {}
            }
            if report_json {
                print_json(&CompileReport {
                    schema_version: VALLUMC_REPORT_SCHEMA_VERSION,
                    command: "compile",
                    ok: true,
                    r#in: input,
                    purpose: Some(output.purpose.to_string()),
                    ir_sha256: Some(hex::encode(Sha256::digest(text.as_bytes()))),
                    parameters: output
                        .parameters
                        .iter()
                        .enumerate()
                        .map(|(i, (name, ty))| json!({ "hole": i, "name": name, "type": ty.to_string() }))
                        .collect(),
                    diagnostics: Report::ok().with_diagnostics(output.warnings.clone()),
                    exit_code: 0,
                })?;
            } else {
                for w in &output.warnings {
                    eprintln!("warning: {}", w.message);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Params { inputs, set } => {
            let (main, modules) = read_inputs(&inputs)?;
            let mut program = Program::from_json(&main, &modules)?;
            for assignment in &set {
                let (name, value) = assignment
                    .split_once('=')
                    .with_context(|| format!("--set expects NAME=JSON, got {assignment:?}"))?;
                let value: Value = serde_json::from_str(value)
                    .with_context(|| format!("parse JSON value of {name}"))?;
                let data = Data::from_json(&value)
                    .map_err(|e| anyhow::anyhow!("value of {name} is not data: {e}"))?;
                program.set_parameter(name, data)?;
            }
            let mut parameters = Vec::new();
            for (name, ty) in program.parameter_types() {
                let value = program.parameter_value(&name)?;
                parameters.push(json!({
                    "name": name,
                    "type": ty.to_string(),
                    "value": value.to_json(),
                }));
            }
            print_json(&json!({
                "schema_version": VALLUM_PARAMS_SCHEMA_VERSION,
                "program": program.name(),
                "purpose": program.purpose().as_str(),
                "parameters": parameters,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Eval {
            inputs,
            arg,
            max_eval_steps,
        } => {
            let (main, modules) = read_inputs(&inputs)?;
            let program = Program::from_json(&main, &modules)?;
            let ir = program.to_ir()?;
            let args = arg
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let v: Value =
                        serde_json::from_str(a).with_context(|| format!("parse --arg #{i}"))?;
                    Data::from_json(&v).map_err(|e| anyhow::anyhow!("--arg #{i} is not data: {e}"))
                })
                .collect::<Result<Vec<_>>>()?;
            let steps = max_eval_steps.unwrap_or_else(language::limits::max_eval_steps);
            let outcome = ir_eval::apply_data(&ir, &args, steps);
            let ok = outcome.result.is_ok();
            let mut report = json!({
                "schema_version": VALLUM_EVAL_REPORT_SCHEMA_VERSION,
                "program": program.name(),
                "ok": ok,
                "steps": outcome.steps,
                "logs": outcome.logs,
            });
            match &outcome.result {
                Ok(c) => report["result"] = constant_json(c),
                Err(e) => report["error"] = json!(e),
            }
            print_json(&report)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
    }
}

fn check_purpose(
    output: compile::CompileOutput,
    expected: Option<ScriptPurpose>,
) -> Result<compile::CompileOutput, CompilerError> {
    match expected {
        Some(p) if p != output.purpose => Err(CompilerError::new(
            compile::CompileErrorKind::Syntax,
            format!("{} is a {} script, expected {p}", output.name, output.purpose),
        )),
        _ => Ok(output),
    }
}

fn read_inputs(inputs: &Inputs) -> Result<(Vec<u8>, Vec<Vec<u8>>)> {
    let main = read_file(&inputs.program)?;
    let modules = inputs
        .modules
        .iter()
        .map(|p| read_file(p))
        .collect::<Result<Vec<_>>>()?;
    Ok((main, modules))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read {}", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn constant_json(c: &Constant) -> Value {
    match c {
        Constant::Int(i) => json!({ "int": i.to_string() }),
        Constant::Bool(b) => json!({ "bool": b }),
        Constant::Str(s) => json!({ "string": s }),
        Constant::Bytes(b) => json!({ "bytes": hex::encode(b) }),
        Constant::Unit => json!({ "unit": null }),
        Constant::Data(d) => json!({ "data": d.to_json() }),
        Constant::List(items) => json!({ "list": items.iter().map(constant_json).collect::<Vec<_>>() }),
        Constant::Pair(a, b) => json!({ "pair": [constant_json(a), constant_json(b)] }),
        Constant::Function => json!({ "function": null }),
    }
}
