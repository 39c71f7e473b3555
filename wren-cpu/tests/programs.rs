//! End-to-end programs: assemble source text, run it, check the output

use wren_cpu::{Cpu, Device, RuntimeError, StepOutcome};
use wren_isa::{Register, PROGRAM_BASE, STACK_TOP};

/// Console backed by in-memory buffers
#[derive(Default)]
struct Buffer {
    input: Vec<u8>,
    output: Vec<u8>,
}

impl Device for Buffer {
    fn input(&mut self) -> u8 {
        if self.input.is_empty() {
            0
        } else {
            self.input.remove(0)
        }
    }
    fn output(&mut self, byte: u8) {
        self.output.push(byte);
    }
}

fn boot(source: &str) -> Cpu {
    let image = wren_asm::assemble(source).expect("assembly failed");
    let mut cpu = Cpu::new();
    cpu.load_program(&image, PROGRAM_BASE).unwrap();
    cpu
}

fn run(source: &str) -> (Cpu, Vec<u8>) {
    let mut cpu = boot(source);
    let mut dev = Buffer::default();
    cpu.run(&mut dev).expect("program faulted");
    (cpu, dev.output)
}

#[test]
fn hello() {
    let (_, out) = run("LOAD A, 72\nOUT 0xFF00, A\nHLT\n");
    assert_eq!(out, b"H");
}

#[test]
fn digit_loop() {
    let (_, out) = run(include_str!("../../demos/count.asm"));
    assert_eq!(out, b"01234");
}

#[test]
fn stack_round_trip() {
    let mut cpu = boot("LOAD A, 0x1234\nPUSH A\nLOAD A, 0\nPOP A\nHLT\n");
    let mut dev = Buffer::default();
    for _ in 0..4 {
        assert_eq!(cpu.step(&mut dev).unwrap(), StepOutcome::Executed);
    }
    assert_eq!(cpu.reg(Register::A), 0x1234);
    assert_eq!(cpu.reg(Register::Sp), STACK_TOP);
    assert_eq!(cpu.cycles(), 4);
    cpu.step(&mut dev).unwrap();
    assert!(cpu.halted());
}

#[test]
fn call_and_ret() {
    let (cpu, _) = run("CALL F\nHLT\nF: LOAD A, 7\nRET\n");
    assert_eq!(cpu.reg(Register::A), 7);
    assert_eq!(cpu.reg(Register::Sp), STACK_TOP);
    // halted by the HLT directly after the CALL operand
    assert_eq!(cpu.reg(Register::Pc), 0x0104);
}

#[test]
fn divide_by_zero_faults() {
    let mut cpu = boot("LOAD A, 10\nLOAD B, 0\nDIV A, B\nHLT\n");
    let mut dev = Buffer::default();
    let err = cpu.run(&mut dev).unwrap_err();
    assert_eq!(err, RuntimeError::DivideByZero { pc: 0x0108 });
    assert!(cpu.halted());
}

#[test]
fn factorial() {
    let (_, out) = run(include_str!("../../demos/factorial.asm"));
    assert_eq!(out, b"3! = 6\n");
}

#[test]
fn fibonacci_uses_the_div_remainder() {
    let (_, out) = run(include_str!("../../demos/fibonacci.asm"));
    assert_eq!(out, b"1\n1\n2\n3\n5\n8\n13\n21\n34\n55\n89\n");
}

#[test]
fn echo_until_eof() {
    let mut cpu = boot(include_str!("../../demos/echo.asm"));
    let mut dev = Buffer {
        input: b"wren\n".to_vec(),
        output: vec![],
    };
    cpu.run(&mut dev).unwrap();
    assert_eq!(dev.output, b"wren\n");
    assert!(cpu.timer().enabled());
    assert!(cpu.timer().value() > 0);
}

#[test]
fn hello_demo() {
    let (_, out) = run(include_str!("../../demos/hello.asm"));
    assert_eq!(out, b"Hi\n");
}
