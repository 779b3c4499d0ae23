mod functions;
mod metadata;
mod queries;
mod saves;
