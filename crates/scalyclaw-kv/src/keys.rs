//! Central definition of every key-namespace prefix used against the KV
//! store (spec.md §4.1: "No component accesses the store except through the
//! adapter" — and through these builders, so the `scalyclaw:`/`progress:`
//! prefixes exist in exactly one place).

pub fn session(channel_id: &str) -> String {
    format!("scalyclaw:session:{channel_id}")
}

pub fn session_index() -> &'static str {
    "scalyclaw:session:index"
}

pub fn scheduled(job_id: &str) -> String {
    format!("scalyclaw:scheduled:{job_id}")
}

pub fn scheduled_index() -> &'static str {
    "scalyclaw:scheduled:index"
}

pub fn agent_profile(id: &str) -> String {
    format!("scalyclaw:agent:{id}")
}

pub fn agent_index() -> &'static str {
    "scalyclaw:agent:index"
}

pub fn secret(name: &str) -> String {
    format!("scalyclaw:secret:{name}")
}

pub fn config_doc() -> &'static str {
    "scalyclaw:config"
}

pub fn config_reload_channel() -> &'static str {
    "scalyclaw:config-reload"
}

pub fn progress(channel_id: &str) -> String {
    format!("progress:{channel_id}")
}

pub fn progress_pattern() -> &'static str {
    "progress:*"
}

pub fn progress_buffer(channel_id: &str) -> String {
    format!("progress-buffer:{channel_id}")
}

pub fn progress_response(job_id: &str) -> String {
    format!("progress-response:{job_id}")
}

pub fn channel_jobs(channel_id: &str) -> String {
    format!("scalyclaw:channel-jobs:{channel_id}")
}

pub fn rate_limit(channel_id: &str) -> String {
    format!("scalyclaw:rate:{channel_id}")
}

pub fn cancel_flag() -> &'static str {
    "scalyclaw:cancel-flag"
}

pub fn adapter_reply(channel: &str) -> String {
    format!("adapter-reply:{channel}")
}

pub fn last_activity(channel_id: &str) -> String {
    format!("scalyclaw:last-activity:{channel_id}")
}

pub fn queue_waiting(queue: &str) -> String {
    format!("scalyclaw:queue:{queue}:waiting")
}

pub fn queue_delayed(queue: &str) -> String {
    format!("scalyclaw:queue:{queue}:delayed")
}

pub fn queue_job(queue: &str, job_id: &str) -> String {
    format!("scalyclaw:queue:{queue}:job:{job_id}")
}

pub fn queue_cancel_channel(queue: &str) -> String {
    format!("queue-cancel:{queue}")
}

/// Every job id ever enqueued on this queue, for admin listing/counts
/// (spec.md §6 "jobs": `GET /api/jobs`, `GET /api/jobs/counts`).
pub fn queue_index(queue: &str) -> String {
    format!("scalyclaw:queue:{queue}:index")
}
