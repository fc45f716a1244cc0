mod controls;
mod details;
mod legend;
mod panels;

pub(in crate::app) use details::write_report;
