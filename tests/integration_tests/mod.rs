mod cli;
mod lifecycle;
mod refresh;
mod status;
