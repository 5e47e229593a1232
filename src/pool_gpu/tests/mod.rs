mod kernel;
mod program_source;
