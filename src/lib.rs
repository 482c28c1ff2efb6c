pub mod album;
pub mod columns;
pub mod controller;
pub mod domain;
pub mod model;
pub mod source;
pub mod storage;
pub mod table;
pub mod ui;
