//! Stand-in for the external tools the runner drives. Used by the integration tests.

use std::io::Write;
use std::process;
use std::thread;
use std::time::Duration;

fn usage() -> ! {
    eprintln!("usage: toolrun-double <echo|lines|exit|warn|sleep|flood|env|pwd> [args...]");
    process::exit(64);
}

fn number(arg: Option<&String>) -> u64 {
    arg.and_then(|s| s.parse().ok()).unwrap_or_else(|| usage())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(mode) = args.first() else { usage() };

    match mode.as_str() {
        "echo" => println!("{}", args[1..].join(" ")),
        "lines" => {
            for i in 1..=number(args.get(1)) {
                println!("line {}", i);
            }
        }
        "exit" => {
            let code = number(args.get(1)) as i32;
            eprintln!("exiting with {}", code);
            process::exit(code);
        }
        "warn" => eprint!("{}", args[1..].join(" ")),
        "sleep" => thread::sleep(Duration::from_secs(number(args.get(1)))),
        "flood" => {
            // Interleave writes so both pipes fill well past any OS buffer.
            let count = number(args.get(1));
            let payload = "x".repeat(120);
            let stdout = std::io::stdout();
            let stderr = std::io::stderr();
            let mut out = stdout.lock();
            let mut err = stderr.lock();
            for i in 0..count {
                let _ = writeln!(out, "out {} {}", i, payload);
                let _ = writeln!(err, "err {} {}", i, payload);
                if i % 64 == 0 {
                    let _ = out.flush();
                }
            }
        }
        "env" => match args.get(1).and_then(|name| std::env::var(name).ok()) {
            Some(value) => println!("{}", value),
            None => process::exit(3),
        },
        "pwd" => match std::env::current_dir() {
            Ok(dir) => println!("{}", dir.display()),
            Err(_) => process::exit(4),
        },
        _ => usage(),
    }
}
