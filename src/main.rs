mod bytecode;
mod frontend;
mod lang;
mod runtime;

use std::{env, fs, process};

use crate::bytecode::Program;
use crate::bytecode::compile::Compiler;
use crate::bytecode::disasm::print_program;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::token_dumper::TokenDumper;
use crate::runtime::vm::{Vm, VmConfig, symbols};

/// Driver-side cycle budget; generous, but malformed grammars cannot spin
/// forever.
const CLI_MAX_CYCLES: usize = 1_000_000;

#[derive(Default)]
struct Options {
    tokens: bool,
    no_color: bool,
    trace: bool,
    bc: bool,
    run: Option<String>,
    emit_bc: Option<String>,
    files: Vec<String>,
}

fn main() {
    let opts = match parse_args(env::args().skip(1)) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if opts.files.is_empty() {
        print_usage();
        process::exit(1);
    }

    for filename in &opts.files {
        let source = match fs::read_to_string(filename) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Failed to read '{}': {}", filename, e);
                process::exit(1);
            }
        };
        process_file(filename, &source, &opts);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tokens" => opts.tokens = true,
            "--no-color" => opts.no_color = true,
            "--trace" => opts.trace = true,
            "--bc" | "--bytecode" => opts.bc = true,
            "--run" => {
                opts.run = Some(args.next().ok_or("--run requires an input argument")?);
            }
            "--emit-bc" => {
                opts.emit_bc = Some(args.next().ok_or("--emit-bc requires a path argument")?);
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown flag: {}", other));
            }
            _ => opts.files.push(arg),
        }
    }
    Ok(opts)
}

fn print_usage() {
    println!("EBNFC - EBNF compiler-compiler and stack virtual machine");
    println!();
    println!("Usage:");
    println!("  ebnfc <grammar.ebnf>...            Parse and print the AST");
    println!("  ebnfc --tokens <file>              Show tokens only");
    println!("  ebnfc --trace <file>               Echo every lexer fetch");
    println!("  ebnfc --bc <file>                  Compile and disassemble");
    println!("  ebnfc --run <input> <file>         Parse <input> with the compiled grammar");
    println!("  ebnfc --emit-bc <path> <file>      Write the compiled program to <path>");
    println!("  ebnfc --no-color                   Plain token dump");
}

/// Handles one grammar file. Lexical and syntax errors are reported and
/// abort this file only; the driver moves on to the next one.
fn process_file(filename: &str, source: &str, opts: &Options) {
    if opts.tokens {
        dump_tokens(source, opts.no_color);
        return;
    }

    let mut lexer = Lexer::new(source);
    if opts.trace {
        lexer = lexer.with_trace();
    }

    let grammar = match Parser::new(lexer).parse() {
        Ok(grammar) => grammar,
        Err(e) => {
            eprintln!("{}: {}", filename, e);
            return;
        }
    };

    if !opts.bc && opts.run.is_none() && opts.emit_bc.is_none() {
        print!("{}", grammar.dump());
        return;
    }

    let program = match Compiler::new().compile(&grammar) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: compile error: {}", filename, e);
            return;
        }
    };

    if opts.bc {
        print_program(&program);
    }

    if let Some(path) = &opts.emit_bc {
        emit_bc(&program, path);
    }

    if let Some(input) = &opts.run {
        run_input(&program, input);
    }
}

fn dump_tokens(source: &str, no_color: bool) {
    let mut lexer = Lexer::new(source);
    match lexer.tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            dumper.dump(&tokens);
        }
        Err(e) => eprintln!("Lexer error: {}", e),
    }
}

fn emit_bc(program: &Program, path: &str) {
    match postcard::to_allocvec(program) {
        Ok(bytes) => {
            if let Err(e) = fs::write(path, bytes) {
                eprintln!("Failed to write '{}': {}", path, e);
            }
        }
        Err(e) => eprintln!("Failed to serialize program: {}", e),
    }
}

fn run_input(program: &Program, input: &str) {
    let input = symbols(input);
    let input: Vec<&str> = input.iter().map(String::as_str).collect();

    let mut vm = Vm::with_config(VmConfig {
        max_cycles: CLI_MAX_CYCLES,
    });
    match vm.run(program, &input) {
        Ok(code) if vm.at_end() => {
            println!("accepted (result {}, {} cycles)", code, vm.cycles());
        }
        Ok(_) => println!("rejected: trailing input"),
        Err(e) if e.is_rejection() => println!("rejected: {}", e),
        Err(e) => eprintln!("vm error: {}", e),
    }
}
