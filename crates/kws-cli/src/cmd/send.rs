//! Outbound messages, requests and the audit log view.

use crate::cmd::{boot_kernel, fail, runtime};
use crate::ui;
use kws_kernel::SendOutcome;
use kws_wire::{ReqCommand, Reply};
use std::path::PathBuf;

fn report(outcome: SendOutcome) {
    match outcome {
        SendOutcome::Delivered(reply) => match Reply::parse(&reply) {
            Some(Reply::List(directory)) => {
                ui::success("Directory received");
                for line in directory.lines() {
                    println!("    {line}");
                }
            }
            Some(Reply::Info(identity)) => ui::kv("Identity", &identity),
            Some(Reply::WrongTarget) => {
                ui::warn("Peer rejected the request: identity mismatch")
            }
            _ => ui::success(&format!("Reply: {}", reply.trim())),
        },
        SendOutcome::Queued => {
            ui::warn("Peer unreachable, request queued for retry");
            ui::hint("It will be re-sent while `kws start` is running");
        }
    }
}

pub fn cmd_message(config: Option<PathBuf>, to: &str, text: &str) {
    let kernel = boot_kernel(config);
    let rt = runtime();
    match rt.block_on(kernel.send_message(to, text)) {
        Ok(outcome) => report(outcome),
        Err(e) => fail(&e),
    }
}

pub fn cmd_request(config: Option<PathBuf>, target: &str, command: &str) {
    let kernel = boot_kernel(config);
    let rt = runtime();
    match rt.block_on(kernel.send_request(target, ReqCommand::parse(command))) {
        Ok(outcome) => report(outcome),
        Err(e) => fail(&e),
    }
}

pub fn cmd_log(config: Option<PathBuf>) {
    let kernel = boot_kernel(config);
    let rt = runtime();
    let log = rt.block_on(kernel.audit_log());
    if log.trim().is_empty() {
        ui::warn("Audit log is empty");
        return;
    }
    print!("{log}");
}
