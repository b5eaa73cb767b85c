//! Text rendering of the portal pages: request tables, dashboard and allocations.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::api::models::{
    AllocationItem, Commodity, CommodityRequest, DashboardStats, RequestLog, RequestStatus, Role,
    UserProfile,
};
use crate::routes::navigation_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

impl Tone {
    fn ansi(&self) -> &'static str {
        match self {
            Tone::Neutral => "\x1b[0m",
            Tone::Info => "\x1b[34m",
            Tone::Success => "\x1b[32m",
            Tone::Warning => "\x1b[33m",
            Tone::Danger => "\x1b[31m",
        }
    }

    pub fn paint(&self, text: &str, color: bool) -> String {
        if color && *self != Tone::Neutral {
            format!("{}{}\x1b[0m", self.ansi(), text)
        } else {
            text.to_string()
        }
    }
}

pub fn status_tone(status: RequestStatus) -> Tone {
    match status {
        RequestStatus::Pending => Tone::Warning,
        RequestStatus::Approved => Tone::Success,
        RequestStatus::Rejected => Tone::Danger,
        RequestStatus::Delivered => Tone::Info,
    }
}

/// Usage bar colour: red from 90%, amber from 70%.
pub fn allocation_tone(percentage_used: f64) -> Tone {
    if percentage_used >= 90.0 {
        Tone::Danger
    } else if percentage_used >= 70.0 {
        Tone::Warning
    } else {
        Tone::Neutral
    }
}

/// Bar width in percent, never past 100.
pub fn allocation_fill(percentage_used: f64) -> f64 {
    percentage_used.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(RequestStatus),
}

impl StatusFilter {
    pub fn matches(&self, request: &CommodityRequest) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => request.status == *status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

pub fn filter_requests(requests: &[CommodityRequest], filter: StatusFilter) -> Vec<&CommodityRequest> {
    requests.iter().filter(|r| filter.matches(r)).collect()
}

pub fn requests_heading(role: Role) -> (&'static str, &'static str) {
    match role {
        Role::Chw => ("My Requests", "Track status of your commodity requests"),
        _ => ("All Requests", "View and manage commodity requests"),
    }
}

pub fn dashboard_greeting(role: Role) -> &'static str {
    match role {
        Role::Chw => "Manage your commodity requests and track allocations",
        Role::Cha => "Review and approve commodity requests from your CHWs",
        Role::Admin => "Monitor system-wide commodity request activities",
    }
}

pub fn empty_requests_message(filter: StatusFilter) -> String {
    match filter {
        StatusFilter::All => "No requests have been made yet.".to_string(),
        StatusFilter::Only(status) => {
            format!("No {} requests found.", status.as_str().to_lowercase())
        }
    }
}

pub fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y, %I:%M %p").to_string()
}

pub fn render_request_table(
    requests: &[&CommodityRequest],
    role: Role,
    filter: StatusFilter,
    color: bool,
) -> String {
    let (title, subtitle) = requests_heading(role);
    let mut out = format!("{}\n{}\n\n", title, subtitle);

    if requests.is_empty() {
        out.push_str("No requests found\n");
        out.push_str(&empty_requests_message(filter));
        out.push('\n');
        return out;
    }

    let show_requester = role.can_approve_requests();
    for request in requests {
        let mut quantity = format!("{} {}", request.quantity_requested, request.commodity_unit);
        if let Some(approved) = request.adjusted_quantity() {
            let _ = write!(quantity, " (approved: {})", approved);
        }
        let padded = format!("{:<10}", request.status_text());
        let status = status_tone(request.status).paint(&padded, color);
        let _ = write!(out, "#{:<5} {:<24} {:<28}", request.id, request.commodity_name, quantity);
        if show_requester {
            let _ = write!(out, " {:<24}", request.requester_name);
        }
        let _ = writeln!(out, " {} {}", status, format_date(&request.created_at));
    }
    out
}

pub fn render_pending(requests: &[CommodityRequest]) -> String {
    if requests.is_empty() {
        return "No pending requests\nAll requests have been processed.\n".to_string();
    }

    let mut out = String::new();
    for request in requests {
        let _ = writeln!(
            out,
            "#{} {} - {} {} requested by {} on {}",
            request.id,
            request.commodity_name,
            request.quantity_requested,
            request.commodity_unit,
            request.requester_name,
            format_date(&request.created_at)
        );
        if let Some(reason) = request.reason_for_request.as_deref().filter(|r| !r.is_empty()) {
            let _ = writeln!(out, "    Reason: {}", reason);
        }
    }
    out
}

pub fn render_dashboard(user: &UserProfile, stats: &DashboardStats, color: bool) -> String {
    let mut out = format!(
        "Welcome back, {}!\n{}\n\n",
        user.first_name,
        dashboard_greeting(user.role)
    );

    let cards = [
        ("Total Requests", stats.total_requests, Tone::Neutral),
        ("Pending", stats.pending_requests, Tone::Warning),
        ("Approved", stats.approved_requests, Tone::Success),
        ("Rejected", stats.rejected_requests, Tone::Danger),
        ("This Month", stats.monthly_requests, Tone::Info),
    ];
    for (name, value, tone) in cards {
        let _ = writeln!(out, "{:<16} {}", name, tone.paint(&value.to_string(), color));
    }

    if !stats.top_commodities.is_empty() {
        out.push_str("\nTop commodities (30 days)\n");
        for top in &stats.top_commodities {
            let _ = writeln!(
                out,
                "  {:<24} {} requests, {} units",
                top.commodity_name,
                top.request_count,
                top.total_quantity.unwrap_or(0)
            );
        }
    }

    if !stats.recent_requests.is_empty() {
        out.push_str("\nRecent requests\n");
        let recent: Vec<&CommodityRequest> = stats.recent_requests.iter().collect();
        for line in render_request_table(&recent, user.role, StatusFilter::All, color)
            .lines()
            .skip(3)
        {
            let _ = writeln!(out, "  {}", line);
        }
    }
    out
}

pub fn render_allocation(items: &[AllocationItem], color: bool) -> String {
    let mut out = String::from("Monthly Allocation Status\n\n");
    for item in items {
        let fill = allocation_fill(item.percentage_used);
        let filled = (fill / 5.0).round() as usize;
        let bar = format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled));
        let _ = writeln!(
            out,
            "{:<24} [{}] {:>3.0}%  {} / {}  {} remaining",
            item.commodity_name,
            allocation_tone(item.percentage_used).paint(&bar, color),
            item.percentage_used,
            item.used,
            item.max_allocation,
            item.remaining
        );
    }
    out
}

pub fn render_commodities(commodities: &[Commodity]) -> String {
    let mut out = String::new();
    for c in commodities {
        let _ = writeln!(
            out,
            "#{:<4} {} ({}) - max {} per request, {} per month",
            c.id, c.name, c.unit_of_measure, c.max_quantity_per_request, c.max_monthly_allocation
        );
    }
    out
}

pub fn render_logs(logs: &[RequestLog]) -> String {
    let mut out = String::new();
    for log in logs {
        let _ = writeln!(
            out,
            "{}  {:<10} {}",
            format_date(&log.timestamp),
            log.action_display.as_deref().unwrap_or(&log.action),
            log.performed_by_name.as_deref().unwrap_or("-")
        );
    }
    out
}

pub fn render_profile(user: &UserProfile) -> String {
    let mut out = String::new();
    let mut field = |label: &str, value: &str| {
        let _ = writeln!(out, "{:<12} {}", label, value);
    };
    field("Username", &user.username);
    field("Role", user.role.as_str());
    field("First name", &user.first_name);
    field("Last name", &user.last_name);
    field("Email", &user.email);
    field("Phone", &user.phone_number);
    field("Location", &user.location);
    if let Some(supervisor) = &user.supervisor_name {
        field("Supervisor", supervisor);
    }

    let menu: Vec<&str> = navigation_for(user.role).iter().map(|i| i.name).collect();
    field("Menu", &menu.join(", "));
    out
}
