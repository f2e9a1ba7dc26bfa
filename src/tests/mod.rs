mod search;
mod support;
mod web;
