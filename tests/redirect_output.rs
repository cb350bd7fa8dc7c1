//! Byte-exact checks on the process standard output.
//!
//! The test harness itself writes to descriptor 1 between tests, so every
//! check lives in a single test function.

use std::ffi::CString;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use mip_bridge::domain::redirect::{
    redirect_output, CaptureBuffer, OutputRedirect, RedirectError, Sink,
};

fn stdout_identity() -> (u64, u64) {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    assert_eq!(unsafe { libc::fstat(libc::STDOUT_FILENO, &mut stat) }, 0);
    (stat.st_dev as u64, stat.st_ino as u64)
}

/// Write straight to descriptor 1, as native engine code does.
fn native_write(text: &str) {
    let written = unsafe { libc::write(libc::STDOUT_FILENO, text.as_ptr().cast(), text.len()) };
    assert_eq!(written, text.len() as isize);
}

/// Buffered C stdio write, only visible once flushed.
fn c_stdio_write(text: &str) {
    let text = CString::new(text).unwrap();
    let format = CString::new("%s").unwrap();
    unsafe {
        libc::printf(format.as_ptr(), text.as_ptr());
    }
}

/// `print!` is intercepted by the harness capture, so go through the handle.
fn rust_write(text: &str) {
    io::stdout().write_all(text.as_bytes()).unwrap();
}

#[test]
fn test_redirect_output() {
    let original = stdout_identity();

    // Basic capture from every kind of writer, in order.
    let buffer = CaptureBuffer::new();
    redirect_output(vec![Sink::buffer(&buffer)], || {
        native_write("Hello world\n");
        rust_write("from rust\n");
        c_stdio_write("from C stdio\n");
    })
    .unwrap();
    assert_eq!(stdout_identity(), original);
    assert_eq!(
        buffer.contents(),
        "Hello world\nfrom rust\nfrom C stdio\n"
    );

    // Large output keeps its byte order.
    let buffer = CaptureBuffer::new();
    let mut expected = String::new();
    redirect_output(vec![Sink::buffer(&buffer)], || {
        for i in 0..5000 {
            let line = format!("line {}\n", i);
            native_write(&line);
            expected.push_str(&line);
        }
    })
    .unwrap();
    assert_eq!(buffer.contents(), expected);

    // Every sink sees identical bytes.
    let (first, second) = (CaptureBuffer::new(), CaptureBuffer::new());
    redirect_output(vec![Sink::buffer(&first), Sink::buffer(&second)], || {
        native_write("to both\n");
    })
    .unwrap();
    assert_eq!(first.bytes(), b"to both\n".to_vec());
    assert_eq!(first.bytes(), second.bytes());

    // An inner scope shadows the outer one...
    let (outer, inner) = (CaptureBuffer::new(), CaptureBuffer::new());
    redirect_output(vec![Sink::buffer(&outer)], || {
        native_write("outer 1\n");
        redirect_output(vec![Sink::buffer(&inner)], || native_write("inner\n")).unwrap();
        native_write("outer 2\n");
    })
    .unwrap();
    assert_eq!(outer.contents(), "outer 1\nouter 2\n");
    assert_eq!(inner.contents(), "inner\n");

    // ...unless it forwards to the stdout active when it began.
    let (outer, inner) = (CaptureBuffer::new(), CaptureBuffer::new());
    redirect_output(vec![Sink::buffer(&outer)], || {
        native_write("outer 1\n");
        redirect_output(vec![Sink::buffer(&inner), Sink::Stdout], || {
            native_write("inner\n")
        })
        .unwrap();
        native_write("outer 2\n");
    })
    .unwrap();
    assert_eq!(outer.contents(), "outer 1\ninner\nouter 2\n");
    assert_eq!(inner.contents(), "inner\n");
    assert_eq!(stdout_identity(), original);

    // The block's own error comes back untouched.
    let buffer = CaptureBuffer::new();
    let result: Result<Result<(), String>, RedirectError> =
        redirect_output(vec![Sink::buffer(&buffer)], || {
            native_write("before failing\n");
            Err("block failed".to_string())
        });
    assert_eq!(result.unwrap(), Err("block failed".to_string()));
    assert_eq!(buffer.contents(), "before failing\n");
    assert_eq!(stdout_identity(), original);

    // A panic propagates after the descriptor has been restored.
    let buffer = CaptureBuffer::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        redirect_output(vec![Sink::buffer(&buffer)], || {
            native_write("before panicking\n");
            panic!("block panicked");
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(stdout_identity(), original);
    assert_eq!(buffer.contents(), "before panicking\n");

    // The guard can be driven by hand.
    let buffer = CaptureBuffer::new();
    let guard = OutputRedirect::begin(vec![Sink::buffer(&buffer)]).unwrap();
    native_write("guarded\n");
    guard.finish().unwrap();
    assert_eq!(buffer.contents(), "guarded\n");
    assert!(matches!(
        redirect_output(Vec::new(), || ()),
        Err(RedirectError::NoSinks)
    ));

    // Guards released outer first still unwind once the inner one ends.
    let (outer, inner) = (CaptureBuffer::new(), CaptureBuffer::new());
    let outer_guard = OutputRedirect::begin(vec![Sink::buffer(&outer)]).unwrap();
    native_write("outer\n");
    let inner_guard = OutputRedirect::begin(vec![Sink::buffer(&inner)]).unwrap();
    assert!(matches!(
        outer_guard.finish(),
        Err(RedirectError::OutOfOrder { .. })
    ));
    native_write("inner\n");
    inner_guard.finish().unwrap();
    assert_eq!(stdout_identity(), original);
    assert_eq!(outer.contents(), "outer\n");
    assert_eq!(inner.contents(), "inner\n");

    // Redirections on different threads never interleave.
    let (main_buffer, thread_buffer) = (CaptureBuffer::new(), CaptureBuffer::new());
    let guard = OutputRedirect::begin(vec![Sink::buffer(&main_buffer)]).unwrap();
    let worker = {
        let thread_buffer = thread_buffer.clone();
        thread::spawn(move || {
            redirect_output(vec![Sink::buffer(&thread_buffer)], || {
                native_write("worker\n");
            })
            .unwrap();
        })
    };
    thread::sleep(Duration::from_millis(50));
    native_write("main\n");
    guard.finish().unwrap();
    worker.join().unwrap();
    assert_eq!(main_buffer.contents(), "main\n");
    assert_eq!(thread_buffer.contents(), "worker\n");
    assert_eq!(stdout_identity(), original);
}
