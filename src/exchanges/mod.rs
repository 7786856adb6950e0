pub mod eunion;
