//! Test program for native engine tests.
//!
//! Globals are changed by a debugger: `do_segfault` makes the program touch an invalid address,
//! `do_loop` makes it spin in `loop_body` forever, `exit_code` is returned from main.
#![allow(non_upper_case_globals)]

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[no_mangle]
pub static do_loop: AtomicI32 = AtomicI32::new(0);
#[no_mangle]
pub static do_segfault: AtomicI32 = AtomicI32::new(0);
#[no_mangle]
pub static exit_code: AtomicI32 = AtomicI32::new(0);

#[no_mangle]
#[inline(never)]
pub extern "C" fn loop_body() {
    thread::sleep(Duration::from_millis(10));
}

fn main() -> ExitCode {
    let usr1 = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&usr1)).unwrap();

    if do_segfault.load(Ordering::SeqCst) != 0 {
        // aligned and non-null, so it is a plain invalid access
        unsafe { (0x10 as *mut i32).write_volatile(0) };
    }

    while do_loop.load(Ordering::SeqCst) != 0 {
        loop_body();
        if usr1.swap(false, Ordering::Relaxed) {
            println!("got SIGUSR1");
        }
    }

    println!("bye");
    ExitCode::from(exit_code.load(Ordering::SeqCst) as u8)
}
