//! Contact directory commands.

use crate::cmd::{boot_kernel, fail, runtime};
use crate::ui;
use std::path::PathBuf;

pub fn cmd_contact_add(
    config: Option<PathBuf>,
    identity: &str,
    username: &str,
    name: &str,
    address: &str,
) {
    let kernel = boot_kernel(config);
    let rt = runtime();
    match rt.block_on(kernel.add_contact(identity, username, name, address)) {
        Ok(contact) => ui::success(&format!(
            "Added {} ({}) at {}",
            contact.display_name, contact.identity, contact.address
        )),
        Err(e) => fail(&e),
    }
}

pub fn cmd_contact_list(config: Option<PathBuf>) {
    let kernel = boot_kernel(config);
    let rt = runtime();
    let contacts = rt.block_on(kernel.contacts());
    if contacts.is_empty() {
        ui::warn("No contacts yet");
        ui::hint("Add one with `kws contact add <identity> --username .. --name .. --address ..`");
        return;
    }

    let rows: Vec<Vec<String>> = contacts
        .iter()
        .map(|c| {
            vec![
                c.display_name.clone(),
                c.username.clone(),
                c.identity.clone(),
                c.address.clone(),
                c.status.to_string(),
                c.last_seen.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        ui::table(
            &["NAME", "USER", "IDENTITY", "ADDRESS", "STATUS", "LAST SEEN"],
            &rows
        )
    );
}
