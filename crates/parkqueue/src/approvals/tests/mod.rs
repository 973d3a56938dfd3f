mod common;
mod loading;
