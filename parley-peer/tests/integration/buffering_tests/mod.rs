mod test_answerer_buffers_candidates;
