mod sheet;
mod sum_engine;
