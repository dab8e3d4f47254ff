//! `goalward todos`: show the agent's task list.

use goalward_core::todo::{TodoFilter, TodoStatus};
use std::path::Path;

use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    status: Option<TodoStatus>,
    tags: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::open_store(&config).await?.todos;

    let todos = store
        .list_todos(TodoFilter {
            status,
            priority: None,
            tags,
        })
        .await?;
    if todos.is_empty() {
        println!("No todos.");
        return Ok(());
    }

    for todo in &todos {
        let due = todo
            .due_date
            .map(|d| format!("due {d}"))
            .unwrap_or_default();
        println!(
            "  [{:>4}] p{} {:<12} {:<14} {}",
            todo.id.0, todo.priority, todo.status, due, todo.title
        );
        if !todo.tags.is_empty() {
            println!("         tags: {}", todo.tags.join(", "));
        }
    }
    println!("\n{} todo(s)", todos.len());

    Ok(())
}
