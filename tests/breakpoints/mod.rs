mod hierarchy_test;
