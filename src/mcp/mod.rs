mod requests;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use minion_core::models::*;
use minion_core::policy::{cc, triggers::Trigger};
use minion_core::Database;

use crate::config::Config;
use crate::onboarding;
pub use requests::*;

const POLL_REMINDER: &str =
    " REMINDER: Ensure poll.sh is running as a background process so you don't miss replies.";

const INBOX_REMINDER: &str = "\n\nREMINDER: If you haven't already this session, re-read \
     PROTOCOL.md and your class profile before starting work.";

#[derive(Clone)]
pub struct McpServer {
    db: Database,
    config: Config,
    tool_router: ToolRouter<Self>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

/// Turn a core result into a tool result. Rejections go back to the calling
/// agent as readable errors; store faults become protocol errors.
fn respond<T>(
    result: minion_core::Result<T>,
    render: impl FnOnce(T) -> Result<String, McpError>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => Ok(CallToolResult::success(vec![Content::text(render(value)?)])),
        Err(err) if err.is_rejection() => {
            tracing::debug!(error = %err, "tool call rejected");
            Ok(CallToolResult::error(vec![Content::text(format!(
                "BLOCKED: {}",
                err
            ))]))
        }
        Err(err) => {
            tracing::error!(error = %err, "tool call failed");
            Err(McpError::internal_error(err.to_string(), None))
        }
    }
}

/// Blank optional strings from tool calls mean "not given".
fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn optional_parse<T>(
    value: &str,
    parse: fn(&str) -> minion_core::Result<T>,
) -> minion_core::Result<Option<T>> {
    match value.trim() {
        "" => Ok(None),
        raw => parse(raw).map(Some),
    }
}

impl McpServer {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl McpServer {
    // --- Agent directory ---

    #[tool(description = "Register (or re-register) an agent. Returns onboarding instructions for its class")]
    async fn register(
        &self,
        params: Parameters<RegisterRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = AgentClass::parse(&req.agent_class).and_then(|agent_class| {
            let transport = Transport::parse(&req.transport)?;
            self.db.register(RegisterAgentInput {
                name: req.agent_name.clone(),
                agent_class,
                model: optional(req.model.clone()),
                description: optional(req.description.clone()),
                transport,
            })
        });
        respond(result, |registration| {
            let agent = registration.agent;
            let mut text = format!(
                "Agent '{}' registered. class={}",
                agent.name,
                agent.agent_class.as_str()
            );
            if let Some(model) = &agent.model {
                text.push_str(&format!(" model={}", model));
            }
            if let Some(description) = &agent.description {
                text.push_str(&format!(" | {}", description));
            }
            text.push_str(&onboarding::section(
                self.config.runtime_dir(),
                agent.agent_class,
            ));
            Ok(text)
        })
    }

    #[tool(description = "Remove an agent. Releases its file claims and leaves message history in place")]
    async fn deregister(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.deregister(&params.0.agent_name), |gone| {
            let mut text = format!("Agent '{}' deregistered. Loot stays on disk.", gone.name);
            for released in &gone.released {
                text.push_str(&format!("\nReleased claim on {}.", released.file_path));
                if let Some(next) = released.next_in_line() {
                    text.push_str(&format!(" Next in line: {}.", next));
                }
            }
            Ok(text)
        })
    }

    #[tool(description = "Rename an agent, rewriting every reference to the old name")]
    async fn rename(&self, params: Parameters<RenameRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.db.rename(&req.old_name, &req.new_name), |_| {
            Ok(format!(
                "Renamed '{}' -> '{}'. All message history updated.",
                req.old_name, req.new_name
            ))
        })
    }

    #[tool(description = "Set your free-form status line")]
    async fn set_status(&self, params: Parameters<SetStatusRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.db.set_status(&req.agent_name, &req.status), |agent| {
            Ok(format!("Status set: {} -> {}", agent.name, req.status))
        })
    }

    #[tool(description = "Update your context summary and HP metrics. Stale context blocks send")]
    async fn set_context(&self, params: Parameters<SetContextRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let input = SetContextInput {
            context: req.context,
            tokens_used: req.tokens_used,
            tokens_limit: req.tokens_limit,
        };
        respond(self.db.set_context(&req.agent_name, input), |agent| {
            let hp = minion_core::policy::hp::hp_summary(
                agent.context_tokens_used,
                agent.context_tokens_limit,
            )
            .map(|hp| format!(" | {}", hp))
            .unwrap_or_default();
            Ok(format!(
                "Context updated: {} -> {}{}",
                agent.name,
                agent.context.as_deref().unwrap_or_default(),
                hp
            ))
        })
    }

    #[tool(description = "List all registered agents with class, HP, status and staleness")]
    async fn who(&self) -> Result<CallToolResult, McpError> {
        respond(self.db.who(), |agents| {
            if agents.is_empty() {
                return Ok("No agents registered.".into());
            }
            to_json(&agents)
        })
    }

    // --- Mailbox ---

    #[tool(description = "Send a message to an agent or 'all'. Read your inbox and keep set_context fresh first")]
    async fn send(&self, params: Parameters<SendRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let input = SendMessageInput {
            from_agent: req.from_agent,
            to_agent: req.to_agent,
            content: req.message,
            cc: cc::parse_list(&req.cc),
        };
        respond(self.db.send(input), |receipt| {
            let cc_note = if receipt.cc.is_empty() {
                String::new()
            } else {
                format!(" (cc: {})", receipt.cc.join(", "))
            };
            let mut text = format!(
                "Message sent from '{}' to '{}'{}.",
                receipt.from_agent, receipt.to_agent, cc_note
            );
            if !receipt.triggers.is_empty() {
                let words: Vec<&str> = receipt.triggers.iter().map(Trigger::word).collect();
                text.push_str(&format!(" Triggers: {}.", words.join(", ")));
            }
            for trigger in receipt.triggers.iter().filter(|t| t.is_enforced()) {
                text.push_str(&format!(" {} is active: {}", trigger.word(), trigger.effect()));
            }
            if receipt.sender_transport == Transport::Terminal {
                text.push_str(POLL_REMINDER);
            }
            Ok(text)
        })
    }

    #[tool(description = "Read and clear your unread messages, oldest first")]
    async fn check_inbox(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.check_inbox(&params.0.agent_name), |inbox| {
            if inbox.messages.is_empty() && inbox.staleness_warning.is_none() {
                return Ok("No new messages.".into());
            }
            let mut text = to_json(&inbox.messages)?;
            text.push_str(INBOX_REMINDER);
            if let Some(warning) = inbox.staleness_warning {
                text.push_str(&format!(
                    "\n\nWARNING: {} Call set_context to update your metrics.",
                    warning
                ));
            }
            Ok(text)
        })
    }

    #[tool(description = "Last N messages across all agents, oldest to newest")]
    async fn get_history(&self, params: Parameters<GetHistoryRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.get_history(params.0.count), |messages| {
            if messages.is_empty() {
                return Ok("No messages yet.".into());
            }
            to_json(&messages)
        })
    }

    #[tool(description = "Delete your old messages and dismiss old broadcasts")]
    async fn purge_inbox(&self, params: Parameters<PurgeInboxRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(
            self.db.purge_inbox(&req.agent_name, req.older_than_hours),
            |outcome| {
                Ok(format!(
                    "Purged {} message(s) and dismissed {} broadcast(s) older than {}h for {}.",
                    outcome.deleted, outcome.dismissed, req.older_than_hours, req.agent_name
                ))
            },
        )
    }

    // --- Battle plan and raid log ---

    #[tool(description = "Set the active battle plan. Lead only. Supersedes the previous plan")]
    async fn set_battle_plan(&self, params: Parameters<SetBattlePlanRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.db.set_battle_plan(&req.agent_name, &req.plan), |plan| {
            Ok(format!(
                "Battle plan #{} set by {}. Status: active.",
                plan.id, plan.set_by
            ))
        })
    }

    #[tool(description = "Battle plans with the given status (default: active)")]
    async fn get_battle_plan(&self, params: Parameters<GetBattlePlanRequest>) -> Result<CallToolResult, McpError> {
        let status = params.0.status;
        let result = PlanStatus::parse(&status).and_then(|s| self.db.get_battle_plan(s));
        respond(result, |plans| {
            if plans.is_empty() {
                return Ok(format!("No battle plans with status '{}'.", status));
            }
            to_json(&plans)
        })
    }

    #[tool(description = "Change a battle plan's status. Lead only")]
    async fn update_battle_plan_status(
        &self,
        params: Parameters<UpdateBattlePlanStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = PlanStatus::parse(&req.status)
            .and_then(|s| self.db.update_battle_plan_status(&req.agent_name, req.plan_id, s));
        respond(result, |change| {
            let mut text = format!(
                "Battle plan #{} status: {} -> {}.",
                change.plan_id,
                change.from.as_str(),
                change.to.as_str()
            );
            if let Some(previous) = change.superseded {
                text.push_str(&format!(" Battle plan #{} superseded.", previous));
            }
            Ok(text)
        })
    }

    #[tool(description = "Append an entry to the raid log")]
    async fn log_raid(&self, params: Parameters<LogRaidRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = RaidPriority::parse(&req.priority)
            .and_then(|p| self.db.log_raid(&req.agent_name, &req.entry, p));
        respond(result, |logged| {
            Ok(format!(
                "Raid log #{} by {} [{}]: {}",
                logged.id,
                logged.agent_name,
                logged.priority.as_str(),
                preview(&logged.entry, 80)
            ))
        })
    }

    #[tool(description = "Read the raid log, newest first, optionally filtered by priority and agent")]
    async fn get_raid_log(&self, params: Parameters<GetRaidLogRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = optional_parse(&req.priority, RaidPriority::parse).and_then(|priority| {
            self.db.get_raid_log(&RaidLogFilter {
                priority,
                agent_name: optional(req.agent_name.clone()),
                count: req.count,
            })
        });
        respond(result, |entries| {
            if entries.is_empty() {
                return Ok("No raid log entries.".into());
            }
            to_json(&entries)
        })
    }

    // --- Tasks ---

    #[tool(description = "Create a task from a spec file. Lead only, needs an active battle plan")]
    async fn create_task(&self, params: Parameters<CreateTaskRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = parse_task_ids(&req.blocked_by).and_then(|blocked_by| {
            self.db.create_task(
                &req.agent_name,
                CreateTaskInput {
                    title: req.title.clone(),
                    task_file: req.task_file.clone(),
                    project: optional(req.project.clone()),
                    zone: optional(req.zone.clone()),
                    blocked_by,
                },
            )
        });
        respond(result, |task| {
            let blocked_note = if task.blocked_by.is_empty() {
                String::new()
            } else {
                let ids: Vec<String> = task.blocked_by.iter().map(|id| format!("#{}", id)).collect();
                format!(" (blocked by {})", ids.join(", "))
            };
            Ok(format!("Task #{} created: {}{}", task.id, task.title, blocked_note))
        })
    }

    #[tool(description = "Assign a task to an agent. Lead only. Refused while moon_crash is active")]
    async fn assign_task(&self, params: Parameters<AssignTaskRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(
            self.db.assign_task(&req.agent_name, req.task_id, &req.assigned_to),
            |assignment| {
                let mut text = format!(
                    "Task #{} assigned to {}. Status: assigned.",
                    assignment.task.id, req.assigned_to
                );
                if !assignment.unresolved_blockers.is_empty() {
                    let ids: Vec<String> = assignment
                        .unresolved_blockers
                        .iter()
                        .map(|id| format!("#{}", id))
                        .collect();
                    text.push_str(&format!(" WARNING: still blocked by {}.", ids.join(", ")));
                }
                Ok(text)
            },
        )
    }

    #[tool(description = "Report progress on a task. Cannot close it: use close_task")]
    async fn update_task(&self, params: Parameters<UpdateTaskRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let files = cc::parse_list(&req.files);
        let result = optional_parse(&req.status, TaskStatus::parse).and_then(|status| {
            self.db.update_task(
                &req.agent_name,
                req.task_id,
                UpdateTaskInput {
                    status,
                    progress: optional(req.progress.clone()),
                    files: (!files.is_empty()).then_some(files),
                },
            )
        });
        respond(result, |task| {
            let mut text = format!(
                "Task #{} updated. Status: {}. Activity: {}.",
                task.id,
                task.status.as_str(),
                task.activity_count
            );
            if task.is_dragging() {
                text.push_str(&format!(
                    " WARNING: task is dragging ({} updates). Consider escalating to the lead.",
                    task.activity_count
                ));
            }
            Ok(text)
        })
    }

    #[tool(description = "List tasks. Without a status filter only open, assigned and in-progress tasks are shown")]
    async fn get_tasks(&self, params: Parameters<GetTasksRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = optional_parse(&req.status, TaskStatus::parse).and_then(|status| {
            self.db.get_tasks(&TaskFilter {
                status,
                project: optional(req.project.clone()),
                zone: optional(req.zone.clone()),
                assigned_to: optional(req.assigned_to.clone()),
                count: req.count,
            })
        });
        respond(result, |tasks| {
            if tasks.is_empty() {
                return Ok("No tasks found.".into());
            }
            to_json(&tasks)
        })
    }

    #[tool(description = "Full detail of one task")]
    async fn get_task(&self, params: Parameters<TaskIdRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.get_task(params.0.task_id), |task| to_json(&task))
    }

    #[tool(description = "Attach a result file to a task so the lead can close it")]
    async fn submit_result(&self, params: Parameters<SubmitResultRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(
            self.db.submit_result(&req.agent_name, req.task_id, &req.result_file),
            |task| {
                Ok(format!(
                    "Result submitted for task #{}: {}. Lead can now close it.",
                    task.id, req.result_file
                ))
            },
        )
    }

    #[tool(description = "Close a task. Lead only, requires a submitted result")]
    async fn close_task(&self, params: Parameters<TaskActionRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.db.close_task(&req.agent_name, req.task_id), |task| {
            Ok(format!("Task #{} closed: {}", task.id, task.title))
        })
    }

    // --- File claims ---

    #[tool(description = "Claim a file for exclusive editing. If it is taken you join its waitlist")]
    async fn claim_file(&self, params: Parameters<ClaimFileRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        match self.db.claim_file(&req.agent_name, &req.file_path) {
            Ok(ClaimOutcome::Waitlisted {
                file_path,
                holder,
                position,
            }) => Ok(CallToolResult::error(vec![Content::text(format!(
                "BLOCKED: '{}' is claimed by '{}'. You are #{} on the waitlist.",
                file_path, holder, position
            ))])),
            result => respond(result, |outcome| match outcome {
                ClaimOutcome::AlreadyHeld { claim } => {
                    Ok(format!("You already hold '{}'.", claim.file_path))
                }
                other => to_json(&other),
            }),
        }
    }

    #[tool(description = "Release a file claim. Lead may force-release someone else's")]
    async fn release_file(&self, params: Parameters<ReleaseFileRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(
            self.db.release_file(&req.agent_name, &req.file_path, req.force),
            |released| {
                let mut text = format!("Released '{}'.", released.file_path);
                if let Some(next) = released.next_in_line() {
                    text.push_str(&format!(
                        " Next in line: {}. Waitlist: {}.",
                        next,
                        released.waitlist.join(", ")
                    ));
                }
                Ok(text)
            },
        )
    }

    #[tool(description = "Current file claims with their waitlists")]
    async fn get_claims(&self, params: Parameters<GetClaimsRequest>) -> Result<CallToolResult, McpError> {
        let holder = optional(params.0.agent_name);
        respond(self.db.get_claims(holder.as_deref()), |claims| {
            if claims.is_empty() {
                return Ok("No active claims.".into());
            }
            to_json(&claims)
        })
    }

    // --- Health ---

    #[tool(description = "Whole-party view: HP, staleness, liveness, claims and active tasks per agent")]
    async fn party_status(&self) -> Result<CallToolResult, McpError> {
        respond(self.db.party_status(), |status| to_json(&status))
    }

    #[tool(description = "Is an agent alive? Judged from its freshest activity signal")]
    async fn check_activity(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.check_activity(&params.0.agent_name), |report| {
            to_json(&report)
        })
    }

    #[tool(description = "Files and zones changed since an agent last called set_context")]
    async fn check_freshness(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.check_freshness(&params.0.agent_name), |report| {
            to_json(&report)
        })
    }

    // --- Session ---

    #[tool(description = "Resume after a restart: plan, recent critical log, your tasks, claims and fenix_down records")]
    async fn cold_start(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.cold_start(&params.0.agent_name), |state| {
            let class = state.agent.agent.agent_class;
            let mut text = to_json(&state)?;
            text.push_str(&onboarding::section(self.config.runtime_dir(), class));
            Ok(text)
        })
    }

    #[tool(description = "Dump what you know before losing context. Replayed on your next cold_start")]
    async fn fenix_down(&self, params: Parameters<FenixDownRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let input = FenixDownInput {
            files: cc::parse_list(&req.files),
            manifest: req.manifest,
        };
        respond(self.db.fenix_down(&req.agent_name, input), |record| {
            Ok(format!(
                "fenix_down #{} saved for {} ({} file(s)). It will be replayed on your next cold_start.",
                record.id,
                record.agent_name,
                record.files.len()
            ))
        })
    }

    #[tool(description = "Record a session debrief file. Lead only")]
    async fn debrief(&self, params: Parameters<DebriefRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.db.debrief(&req.agent_name, &req.debrief_file), |entry| {
            Ok(format!("Debrief logged as raid entry #{}: {}", entry.id, req.debrief_file))
        })
    }

    #[tool(description = "End the session: complete the active battle plan. Lead only")]
    async fn end_session(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.end_session(&params.0.agent_name), |end| {
            let plan = match end.completed_plan {
                Some(id) => format!("Battle plan #{} completed.", id),
                None => "No active battle plan.".to_string(),
            };
            Ok(format!(
                "Session ended by {}. {} {} active task(s), {} held claim(s) remain.",
                end.ended_by, plan, end.active_tasks, end.held_claims
            ))
        })
    }

    // --- Emergency flag ---

    #[tool(description = "Trigger words, their effects, and the current emergency flags")]
    async fn get_triggers(&self) -> Result<CallToolResult, McpError> {
        respond(self.db.get_triggers(), |board| to_json(&board))
    }

    #[tool(description = "Lower the moon_crash flag so task assignment resumes. Lead only")]
    async fn clear_moon_crash(&self, params: Parameters<AgentRequest>) -> Result<CallToolResult, McpError> {
        respond(self.db.clear_moon_crash(&params.0.agent_name), |was_set| {
            Ok(if was_set {
                "moon_crash cleared. Task assignment resumed.".to_string()
            } else {
                "moon_crash was not active.".to_string()
            })
        })
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "minion-comms coordinates a party of AI agents: register, set_context, \
                 check_inbox before send, follow the battle plan, claim files before editing."
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(db: Database, config: Config) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!(db = %config.db_path.display(), "Starting MCP server via stdio");

    let service = McpServer::new(db, config);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
