mod frames;
mod pipeline;
