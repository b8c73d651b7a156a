//! Core of the hardsub extractor: fetch or locate a video, hand it to the
//! OCR library and collect the produced subtitle files.

pub mod config;
pub mod dispatch;
pub mod download;
pub mod extractor;
pub mod listing;
pub mod srt;
