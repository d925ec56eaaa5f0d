//! Driver programs.
//!
//! Each program is a plain function over its [`UserContext`]; [`install`]
//! registers them under their `.coff` image names.

use alloc::string::String;
use alloc::vec::Vec;

use kernel::{ImageRegistry, UserContext, STDOUT};

use crate::io::{println, write_all};
use crate::uprintln;

/// Buffer size `writefile` copies with.
pub const BUFSIZE: usize = 1024;

/// Image names and entry points of every driver program.
pub const PROGRAMS: &[(&str, fn(&UserContext) -> i32)] = &[
    ("hello.coff", hello),
    ("testexec.coff", testexec),
    ("writefile.coff", writefile),
    ("deadloop.coff", deadloop),
    ("loopspawn.coff", loopspawn),
];

/// Register every driver program with `registry`.
pub fn install(registry: &ImageRegistry) {
    for (name, entry) in PROGRAMS {
        let entry = *entry;
        registry.register(name, move |ctx| entry(ctx));
    }
}

fn argv(ctx: &UserContext) -> Vec<&str> {
    ctx.args().iter().map(String::as_str).collect()
}

pub fn hello(ctx: &UserContext) -> i32 {
    println(ctx, "Hello world!");
    0
}

/// Exec `hello.coff`, join it, then try to join it a second time.
pub fn testexec(ctx: &UserContext) -> i32 {
    let args = argv(ctx);
    let mut status = 0;

    let pid = ctx.exec("hello.coff", &args);
    if pid == -1 {
        println(ctx, "Cannot execute!");
        return 0;
    }

    uprintln!(ctx, "Waiting for PID {}", pid);
    report_join(ctx, pid, &mut status);
    println(ctx, "Join for the second time");
    report_join(ctx, pid, &mut status);
    0
}

fn report_join(ctx: &UserContext, pid: i32, status: &mut i32) {
    if ctx.join(pid, status) == -1 {
        println(ctx, "Join failure!");
    } else {
        uprintln!(ctx, "PID {} has joined with status = {}", pid, status);
    }
}

/// Copy `test.txt` to stdout.
pub fn writefile(ctx: &UserContext) -> i32 {
    let fd = ctx.open("test.txt");
    if fd == -1 {
        crate::io::print(ctx, "Unable to open test.txt");
        return 1;
    }

    let mut buf = [0u8; BUFSIZE];
    loop {
        let amount = ctx.read(fd, &mut buf);
        if amount <= 0 {
            break;
        }
        write_all(ctx, STDOUT, &buf[..amount as usize]);
    }

    ctx.close(fd);
    0
}

/// Never returns on its own.
pub fn deadloop(ctx: &UserContext) -> i32 {
    loop {
        ctx.yield_now();
    }
}

/// Start two `deadloop.coff` children, then wait for both.
pub fn loopspawn(ctx: &UserContext) -> i32 {
    let args = argv(ctx);
    let mut status = 0;

    println(ctx, "Parent: Execute another program");
    let first = ctx.exec("deadloop.coff", &args);
    if first == -1 {
        println(ctx, "Cannot execute!");
    }
    let second = ctx.exec("deadloop.coff", &args);
    if second == -1 {
        println(ctx, "Cannot execute!");
    }

    println(ctx, "Parent: Begin to wait two children!");
    for pid in [first, second] {
        if ctx.join(pid, &mut status) == -1 {
            uprintln!(ctx, "Join pid = {} failure!", pid);
        } else {
            uprintln!(ctx, "PID {} has joined with status = {}", pid, status);
        }
    }
    0
}
